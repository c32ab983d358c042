//! Accessory host backed by a character device node
//!
//! On the device side of an accessory link the transport surfaces as a
//! character device (e.g. `/dev/usb_accessory`). Opening the node yields
//! the transport descriptor; detachment makes the node disappear, which
//! a per-subscription poll task turns into a [`AccessoryEvent::Detached`]
//! notification.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::descriptor::AccessoryDescriptor;
use crate::error::{Error, Result};
use crate::host::AccessoryHost;
use crate::watch::{AccessoryEvent, AccessoryWatcher, Subscription, SubscriptionId};

/// Default poll interval for detachment detection
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct WatchState {
    next_id: u64,
    watchers: HashMap<u64, JoinHandle<()>>,
}

/// Accessory host reading and watching a device node
pub struct CharDevHost {
    path: PathBuf,
    poll_interval: Duration,
    state: Mutex<WatchState>,
}

impl CharDevHost {
    /// Create a host for the given accessory device node
    pub fn new(path: impl AsRef<Path>, poll_interval: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            poll_interval,
            state: Mutex::new(WatchState {
                next_id: 0,
                watchers: HashMap::new(),
            }),
        }
    }

    /// The device node this host opens and watches
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccessoryHost for CharDevHost {
    fn open(&self, accessory: &AccessoryDescriptor) -> Result<OwnedFd> {
        log::debug!(
            "Opening accessory transport {} for {}",
            self.path.display(),
            accessory
        );

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    Error::NotAttached(format!("{} does not exist", self.path.display()))
                }
                ErrorKind::PermissionDenied => {
                    Error::PermissionDenied(format!("cannot open {}", self.path.display()))
                }
                _ => Error::Open(format!("{}: {}", self.path.display(), e)),
            })?;

        Ok(OwnedFd::from(file))
    }
}

impl AccessoryWatcher for CharDevHost {
    /// Subscribe to detachment notifications
    ///
    /// Must be called from within a tokio runtime: each subscription runs
    /// a poll task that raises [`AccessoryEvent::Detached`] once the
    /// device node disappears, then ends.
    fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;

        let path = self.path.clone();
        let interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !path.exists() {
                    log::debug!("Accessory node {} disappeared", path.display());
                    let _ = tx.send(AccessoryEvent::Detached);
                    break;
                }
            }
        });

        state.watchers.insert(id, handle);

        Ok(Subscription {
            id: SubscriptionId(id),
            events: rx,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        match self.state.lock().unwrap().watchers.remove(&id.0) {
            Some(handle) => {
                handle.abort();
                Ok(())
            }
            None => Err(Error::NotSubscribed),
        }
    }
}

impl Drop for CharDevHost {
    fn drop(&mut self) {
        for (_, handle) in self.state.lock().unwrap().watchers.drain() {
            handle.abort();
        }
    }
}
