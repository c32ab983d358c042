//! Mock collaborators for testing the session lifecycle
//!
//! These doubles record every interaction so tests can assert the
//! exactly-once properties of the controller: how often the forwarding
//! engine was started and stopped, which descriptors it was handed, and
//! what configuration reached the interface configurator.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tether_tun::TunConfig;
use tether_usb::mock::pipe_pair;

use crate::error::{Error, Result};
use crate::forward::ForwardingEngine;
use crate::iface::InterfaceConfigurator;
use crate::report::Reporter;

/// Forwarding engine double recording handoffs
pub struct MockForwardingEngine {
    running: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    fail_start: AtomicBool,
    handles: Mutex<Option<(OwnedFd, OwnedFd)>>,
}

impl MockForwardingEngine {
    /// Create an engine that is not running
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            handles: Mutex::new(None),
        }
    }

    /// Make the next `start` call fail after releasing the descriptors
    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Number of `start` invocations (including failed ones)
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of `stop` invocations
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Raw values of the descriptors currently held, if running
    pub fn handle_fds(&self) -> Option<(RawFd, RawFd)> {
        self.handles
            .lock()
            .unwrap()
            .as_ref()
            .map(|(tun, accessory)| (tun.as_raw_fd(), accessory.as_raw_fd()))
    }
}

impl Default for MockForwardingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardingEngine for MockForwardingEngine {
    fn start(&self, tun: OwnedFd, accessory: OwnedFd) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.swap(false, Ordering::SeqCst) {
            // Both descriptors drop (and release) on return
            return Err(Error::Forward("injected handoff failure".into()));
        }
        *self.handles.lock().unwrap() = Some((tun, accessory));
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        *self.handles.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Interface configurator double handing out pipe descriptors
pub struct MockConfigurator {
    fail_next: AtomicBool,
    establish_count: AtomicUsize,
    last_config: Mutex<Option<TunConfig>>,
    last_fd: AtomicI32,
}

impl MockConfigurator {
    /// Create a configurator that succeeds
    pub fn new() -> Self {
        Self {
            fail_next: AtomicBool::new(false),
            establish_count: AtomicUsize::new(0),
            last_config: Mutex::new(None),
            last_fd: AtomicI32::new(-1),
        }
    }

    /// Make the next `establish` call fail
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful `establish` calls
    pub fn establish_count(&self) -> usize {
        self.establish_count.load(Ordering::SeqCst)
    }

    /// Configuration received by the most recent `establish` call
    pub fn last_config(&self) -> Option<TunConfig> {
        self.last_config.lock().unwrap().clone()
    }

    /// Raw value of the descriptor handed out last
    pub fn last_raw_fd(&self) -> RawFd {
        self.last_fd.load(Ordering::SeqCst)
    }
}

impl Default for MockConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InterfaceConfigurator for MockConfigurator {
    async fn establish(
        &self,
        config: &TunConfig,
    ) -> std::result::Result<OwnedFd, tether_tun::Error> {
        *self.last_config.lock().unwrap() = Some(config.clone());

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(tether_tun::Error::DeviceCreation(
                "injected establishment failure".into(),
            ));
        }

        let (read_end, _write_end) = pipe_pair()?;
        self.establish_count.fetch_add(1, Ordering::SeqCst);
        self.last_fd.store(read_end.as_raw_fd(), Ordering::SeqCst);
        Ok(read_end)
    }
}

/// Reporter double collecting messages
pub struct RecordingReporter {
    messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
    /// Create a reporter with no messages
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages reported so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_usb::mock::fd_is_open;

    #[tokio::test]
    async fn test_mock_engine_owns_handles_until_stop() {
        let engine = MockForwardingEngine::new();
        let (tun, _tun_peer) = pipe_pair().unwrap();
        let (accessory, _acc_peer) = pipe_pair().unwrap();

        engine.start(tun, accessory).unwrap();
        assert!(engine.is_running());

        let (tun_raw, acc_raw) = engine.handle_fds().unwrap();
        assert!(fd_is_open(tun_raw));
        assert!(fd_is_open(acc_raw));

        engine.stop();
        assert!(!engine.is_running());
        assert!(engine.handle_fds().is_none());
        assert!(!fd_is_open(tun_raw));
        assert!(!fd_is_open(acc_raw));
    }

    #[tokio::test]
    async fn test_mock_engine_releases_on_injected_failure() {
        let engine = MockForwardingEngine::new();
        let (tun, _tun_peer) = pipe_pair().unwrap();
        let (accessory, _acc_peer) = pipe_pair().unwrap();
        let tun_raw = tun.as_raw_fd();
        let acc_raw = accessory.as_raw_fd();

        engine.fail_next_start();
        assert!(engine.start(tun, accessory).is_err());
        assert!(!engine.is_running());
        assert!(!fd_is_open(tun_raw));
        assert!(!fd_is_open(acc_raw));
    }

    #[tokio::test]
    async fn test_mock_configurator_records_config() {
        let configurator = MockConfigurator::new();
        let config = TunConfig::builder()
            .ipv4("10.0.0.2".parse::<std::net::Ipv4Addr>().unwrap(), 30)
            .build()
            .unwrap();

        let fd = configurator.establish(&config).await.unwrap();
        assert_eq!(configurator.establish_count(), 1);
        assert_eq!(configurator.last_raw_fd(), fd.as_raw_fd());

        let seen = configurator.last_config().unwrap();
        assert_eq!(seen.mtu, config.mtu);
    }
}
