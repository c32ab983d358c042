//! Packet-forwarding engine contract and default relay
//!
//! The session controller hands both transport descriptors to a
//! [`ForwardingEngine`] and observes its running flag for admission.
//! What travels on the wire between the interface and the accessory is
//! the engine's concern, not the controller's.

use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// Buffer size for relay reads; must hold a full interface packet
const RELAY_BUFFER_SIZE: usize = 65536;

/// Contract consumed by the session controller
///
/// # Ownership
///
/// `start` takes exclusive ownership of both descriptors. If it returns
/// `Ok`, the engine owns them until `stop`; if it returns `Err`, the
/// engine has already released both before returning. The caller never
/// closes a descriptor it handed off, in either outcome.
pub trait ForwardingEngine: Send + Sync {
    /// Begin forwarding between the two descriptors
    ///
    /// The controller guarantees this is never called while the engine
    /// is already running.
    fn start(&self, tun: OwnedFd, accessory: OwnedFd) -> Result<()>;

    /// Halt forwarding and release both descriptors
    ///
    /// Safe to call when not running (no-op).
    fn stop(&self);

    /// Non-blocking query of the engine's running flag
    fn is_running(&self) -> bool;
}

/// Default forwarding engine: copies packets between the interface and
/// the accessory transport, unmodified, on two tokio tasks
///
/// `start` must be called from within a tokio runtime.
pub struct RelayEngine {
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<AbortHandle>>,
}

impl RelayEngine {
    /// Create a relay that is not yet running
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardingEngine for RelayEngine {
    fn start(&self, tun: OwnedFd, accessory: OwnedFd) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            // Descriptors drop (and release) on return
            return Err(Error::Forward("relay is already running".into()));
        }

        let raw_tun = tun.as_raw_fd();
        // SAFETY: raw_tun is a valid open TUN descriptor; on success the
        // device takes over ownership and `tun` must not close it again
        let device = match unsafe { tun_rs::AsyncDevice::from_fd(raw_tun) } {
            Ok(device) => {
                std::mem::forget(tun);
                Arc::new(device)
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(Error::Forward(format!(
                    "failed to adopt tun descriptor: {}",
                    e
                )));
            }
        };

        let accessory_file = std::fs::File::from(accessory);
        let accessory_reader = match accessory_file.try_clone() {
            Ok(file) => file,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(Error::Forward(format!(
                    "failed to clone accessory descriptor: {}",
                    e
                )));
            }
        };

        let mut reader = tokio::fs::File::from_std(accessory_reader);
        let mut writer = tokio::fs::File::from_std(accessory_file);

        // Interface -> accessory
        let device_rx = device.clone();
        let mut tun_to_accessory = tokio::spawn(async move {
            let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
            loop {
                match device_rx.recv(&mut buf).await {
                    Ok(n) if n > 0 => {
                        if let Err(e) = writer.write_all(&buf[..n]).await {
                            log::error!("Accessory write error: {}", e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("TUN read error: {}", e);
                        break;
                    }
                }
            }
        });

        // Accessory -> interface
        let device_tx = device;
        let mut accessory_to_tun = tokio::spawn(async move {
            let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        log::info!("Accessory transport closed");
                        break;
                    }
                    Ok(n) => {
                        if let Err(e) = device_tx.send(&buf[..n]).await {
                            log::error!("TUN write error: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("Accessory read error: {}", e);
                        break;
                    }
                }
            }
        });

        let mut aborts = vec![
            tun_to_accessory.abort_handle(),
            accessory_to_tun.abort_handle(),
        ];

        // Either direction dying takes the whole relay down
        let running = self.running.clone();
        let supervisor = tokio::spawn(async move {
            tokio::select! {
                _ = &mut tun_to_accessory => {}
                _ = &mut accessory_to_tun => {}
            }
            tun_to_accessory.abort();
            accessory_to_tun.abort();
            running.store(false, Ordering::SeqCst);
        });
        aborts.push(supervisor.abort_handle());

        *self.tasks.lock().unwrap() = aborts;

        log::info!("Relay started");
        Ok(())
    }

    fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() && !self.running.load(Ordering::SeqCst) {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
        log::info!("Relay stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_usb::mock::{fd_is_open, pipe_pair};

    #[tokio::test]
    async fn test_relay_stop_without_start_is_noop() {
        let relay = RelayEngine::new();
        assert!(!relay.is_running());
        relay.stop();
        assert!(!relay.is_running());
    }

    #[tokio::test]
    async fn test_relay_rejects_double_start() {
        // Pipes stand in for the real descriptors; adopting a pipe as a
        // TUN device is fine for ownership bookkeeping
        let relay = RelayEngine::new();
        let (tun, _tun_peer) = pipe_pair().unwrap();
        let (accessory, _acc_peer) = pipe_pair().unwrap();

        relay.start(tun, accessory).unwrap();
        assert!(relay.is_running());

        let (tun2, _p1) = pipe_pair().unwrap();
        let (acc2, _p2) = pipe_pair().unwrap();
        let tun2_raw = tun2.as_raw_fd();
        let acc2_raw = acc2.as_raw_fd();

        assert!(relay.start(tun2, acc2).is_err());
        // A refused handoff releases both descriptors
        assert!(!fd_is_open(tun2_raw));
        assert!(!fd_is_open(acc2_raw));

        relay.stop();
        assert!(!relay.is_running());
    }
}
