//! Mock accessory host for testing
//!
//! [`MockAccessoryHost`] implements both [`AccessoryHost`] and
//! [`AccessoryWatcher`] with full injection and observation:
//!
//! - Opened transports are real pipe descriptors, so tests can observe
//!   whether a handed-out descriptor was released
//! - `detach()` and `resolve_permission()` inject events into every
//!   active subscription
//! - `fail_next_open()` makes the next open attempt fail
//!
//! # Example
//!
//! ```ignore
//! use tether_usb::mock::MockAccessoryHost;
//! use tether_usb::{AccessoryDescriptor, AccessoryHost, AccessoryWatcher};
//!
//! let host = MockAccessoryHost::new();
//! let mut subscription = host.subscribe().unwrap();
//!
//! let fd = host.open(&AccessoryDescriptor::new("Peer-X", "10.0.0.2")).unwrap();
//! host.detach();
//! // subscription.events now yields AccessoryEvent::Detached
//! ```

use std::collections::HashMap;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedSender};

use crate::descriptor::AccessoryDescriptor;
use crate::error::{Error, Result};
use crate::host::AccessoryHost;
use crate::watch::{AccessoryEvent, AccessoryWatcher, Subscription, SubscriptionId};

/// Create a connected pipe, both ends owned
pub fn pipe_pair() -> std::io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0i32; 2];
    // SAFETY: fds points at a valid two-element array
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: pipe returned two freshly opened descriptors we now own
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Check whether a raw descriptor number currently refers to an open file
///
/// Only meaningful while the test opens no other descriptors in between;
/// a closed number may be reused by an unrelated open.
pub fn fd_is_open(fd: RawFd) -> bool {
    // SAFETY: F_GETFD does not modify the descriptor
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

/// Mock accessory host with event and failure injection
pub struct MockAccessoryHost {
    subscribers: Mutex<HashMap<u64, UnboundedSender<AccessoryEvent>>>,
    next_id: AtomicU64,
    open_count: AtomicUsize,
    unsubscribe_count: AtomicUsize,
    fail_next_open: AtomicBool,
    last_fd: AtomicI32,
}

impl MockAccessoryHost {
    /// Create a new mock host with no subscriptions
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            open_count: AtomicUsize::new(0),
            unsubscribe_count: AtomicUsize::new(0),
            fail_next_open: AtomicBool::new(false),
            last_fd: AtomicI32::new(-1),
        }
    }

    /// Make the next `open` call fail with [`Error::Open`]
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Inject a detachment event into every active subscription
    pub fn detach(&self) {
        for tx in self.subscribers.lock().unwrap().values() {
            let _ = tx.send(AccessoryEvent::Detached);
        }
    }

    /// Inject a permission result into every active subscription
    pub fn resolve_permission(&self, granted: bool) {
        for tx in self.subscribers.lock().unwrap().values() {
            let _ = tx.send(AccessoryEvent::PermissionResult { granted });
        }
    }

    /// Number of successful `open` calls so far
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Number of successful `unsubscribe` calls so far
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Number of currently active subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Raw value of the descriptor handed out by the last successful open
    ///
    /// Combine with [`fd_is_open`] to observe release.
    pub fn last_raw_fd(&self) -> RawFd {
        self.last_fd.load(Ordering::SeqCst)
    }
}

impl Default for MockAccessoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessoryHost for MockAccessoryHost {
    fn open(&self, accessory: &AccessoryDescriptor) -> Result<OwnedFd> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::Open(format!("injected open failure for {}", accessory)));
        }

        let (read_end, _write_end) = pipe_pair()?;
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.last_fd.store(read_end.as_raw_fd(), Ordering::SeqCst);
        Ok(read_end)
    }
}

impl AccessoryWatcher for MockAccessoryHost {
    fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().insert(id, tx);

        Ok(Subscription {
            id: SubscriptionId(id),
            events: rx,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        match self.subscribers.lock().unwrap().remove(&id.0) {
            Some(_) => {
                self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(Error::NotSubscribed),
        }
    }
}
