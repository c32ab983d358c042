//! Session lifecycle controller
//!
//! One tethering session at a time: an admitted start request subscribes
//! the accessory listener, opens the accessory transport, establishes the
//! virtual interface, and hands both descriptors to the forwarding
//! engine, returning to the caller as soon as the handoff is done.
//! Detachment events and explicit stop requests funnel into the same
//! teardown, which runs exactly once per session.
//!
//! # Concurrency
//!
//! The whole admission sequence runs under one async mutex, so a second
//! start request arriving mid-setup waits briefly and then fails the
//! admission guard instead of interleaving. Detachment events are
//! consumed by a controller-owned task from the subscription channel and
//! go through the same mutex, which is what makes teardown exactly-once.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use tether_tun::TunConfig;
use tether_usb::{
    AccessoryDescriptor, AccessoryEvent, AccessoryHost, AccessoryWatcher, SubscriptionId,
};

use crate::config::{peer_address, SessionConfig};
use crate::error::{Error, Result};
use crate::event::{EventHandler, LoggingEventHandler, SessionEvent, SessionState};
use crate::forward::ForwardingEngine;
use crate::iface::InterfaceConfigurator;
use crate::report::{LogReporter, Reporter};

/// State guarded by the admission lock
struct SessionInner {
    state: SessionState,
    subscription: Option<SubscriptionId>,
}

/// Orchestrates a single reverse-tethering session
pub struct SessionController {
    config: SessionConfig,
    host: Arc<dyn AccessoryHost>,
    watcher: Arc<dyn AccessoryWatcher>,
    configurator: Arc<dyn InterfaceConfigurator>,
    engine: Arc<dyn ForwardingEngine>,
    reporter: Arc<dyn Reporter>,
    events: Arc<dyn EventHandler>,
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionController {
    /// Create a controller in the `Idle` state
    pub fn new(
        config: SessionConfig,
        host: Arc<dyn AccessoryHost>,
        watcher: Arc<dyn AccessoryWatcher>,
        configurator: Arc<dyn InterfaceConfigurator>,
        engine: Arc<dyn ForwardingEngine>,
    ) -> Self {
        Self {
            config,
            host,
            watcher,
            configurator,
            engine,
            reporter: Arc::new(LogReporter),
            events: Arc::new(LoggingEventHandler),
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                subscription: None,
            })),
        }
    }

    /// Set a custom diagnostics reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set a custom event handler
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = handler;
        self
    }

    /// Get the current session state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Start a tethering session for the given accessory
    ///
    /// Non-blocking from the caller's point of view: once the descriptors
    /// are handed to the forwarding engine this returns; forwarding runs
    /// inside the engine. `Ok(())` means the session is now `Running`.
    ///
    /// # Errors
    ///
    /// * [`Error::AccessoryUnavailable`] - no accessory reference given
    /// * [`Error::AlreadyRunning`] - another session holds the slot
    /// * [`Error::AccessoryOpen`] - accessory transport refused to open
    /// * [`Error::InterfaceEstablishment`] - interface could not come up
    /// * [`Error::Forward`] - the engine refused the handoff
    ///
    /// Every failure releases whatever was acquired before it and leaves
    /// the controller back in `Idle`.
    pub async fn start(&self, accessory: Option<AccessoryDescriptor>) -> Result<()> {
        // Admission and setup are one critical section: a concurrent
        // start serializes here and then fails the guard below
        let mut inner = self.inner.lock().await;

        let Some(accessory) = accessory else {
            return Err(self.surface(Error::AccessoryUnavailable));
        };

        if inner.state.is_active() || self.engine.is_running() {
            log::warn!("Start request for {} refused: session active", accessory);
            return Err(self.surface(Error::AlreadyRunning));
        }

        log::info!("Starting session for accessory {}", accessory);
        self.set_state(&mut inner, SessionState::AwaitingAccessory).await;

        let subscription = match self.watcher.subscribe() {
            Ok(subscription) => subscription,
            Err(e) => {
                self.set_state(&mut inner, SessionState::Idle).await;
                return Err(self.surface(Error::AccessoryOpen(e)));
            }
        };
        inner.subscription = Some(subscription.id);

        self.set_state(&mut inner, SessionState::Configuring).await;

        let accessory_fd = match self.host.open(&accessory) {
            Ok(fd) => fd,
            Err(e) => {
                // Interface not built yet; only the subscription to undo
                self.abort_setup(&mut inner).await;
                return Err(self.surface(Error::AccessoryOpen(e)));
            }
        };

        let tun_config = match self.interface_config(&accessory) {
            Ok(config) => config,
            Err(e) => {
                drop(accessory_fd);
                self.abort_setup(&mut inner).await;
                return Err(self.surface(e));
            }
        };

        let address = tun_config
            .ipv4
            .as_ref()
            .map(|ipv4| ipv4.address)
            .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);

        let tun_fd = match self.configurator.establish(&tun_config).await {
            Ok(fd) => fd,
            Err(e) => {
                // Close the already-opened accessory transport, exactly once
                drop(accessory_fd);
                self.abort_setup(&mut inner).await;
                return Err(self.surface(Error::InterfaceEstablishment(e)));
            }
        };

        // Ownership of both descriptors transfers here; from this point
        // the controller never closes them itself
        if let Err(e) = self.engine.start(tun_fd, accessory_fd) {
            self.abort_setup(&mut inner).await;
            return Err(self.surface(e));
        }

        self.spawn_detach_watch(subscription.events);
        self.set_state(&mut inner, SessionState::Running).await;
        self.events
            .on_event(SessionEvent::Established {
                address,
                accessory: accessory.to_string(),
            })
            .await;

        Ok(())
    }

    /// Stop the running session
    ///
    /// No-op when no session is running; a session torn down by
    /// detachment cannot be torn down again.
    pub async fn stop(&self) {
        teardown(
            &self.inner,
            self.engine.as_ref(),
            self.watcher.as_ref(),
            self.events.as_ref(),
            "stop requested",
        )
        .await;
    }

    /// Build the interface configuration for an admitted accessory
    fn interface_config(&self, accessory: &AccessoryDescriptor) -> Result<TunConfig> {
        let address = peer_address(&accessory.serial)?;

        let mut builder = TunConfig::builder()
            .name(&self.config.interface)
            .ipv4(address, self.config.prefix_len)
            .mtu(self.config.mtu);
        for network in &self.config.routes {
            builder = builder.route(*network);
        }
        for server in &self.config.dns {
            builder = builder.dns_server(*server);
        }

        builder.build().map_err(Error::InterfaceEstablishment)
    }

    /// Consume detachment events for the lifetime of the subscription
    ///
    /// The task ends on its own once teardown unsubscribes the listener
    /// and the channel closes.
    fn spawn_detach_watch(&self, mut events: UnboundedReceiver<AccessoryEvent>) {
        let inner = self.inner.clone();
        let engine = self.engine.clone();
        let watcher = self.watcher.clone();
        let handler = self.events.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    AccessoryEvent::Detached => {
                        log::info!("Accessory detached");
                        teardown(
                            &inner,
                            engine.as_ref(),
                            watcher.as_ref(),
                            handler.as_ref(),
                            "accessory detached",
                        )
                        .await;
                    }
                    AccessoryEvent::PermissionResult { granted } => {
                        // Accepted for extension; nothing to act on here
                        log::debug!(
                            "Accessory permission {}",
                            if granted { "granted" } else { "denied" }
                        );
                    }
                }
            }
        });
    }

    /// Undo a partially-admitted start: drop the subscription, go `Idle`
    async fn abort_setup(&self, inner: &mut SessionInner) {
        if let Some(id) = inner.subscription.take() {
            if let Err(e) = self.watcher.unsubscribe(id) {
                log::warn!("Listener unsubscription failed: {}", e);
            }
        }
        self.set_state(inner, SessionState::Idle).await;
    }

    /// Update the state and emit the transition
    async fn set_state(&self, inner: &mut SessionInner, new: SessionState) {
        let old = inner.state;
        inner.state = new;
        if old != new {
            self.events
                .on_event(SessionEvent::StateChanged { old, new })
                .await;
        }
    }

    /// Report user-visible failures, pass the error through
    fn surface(&self, error: Error) -> Error {
        if let Some(message) = error.user_message() {
            self.reporter.report(&message);
        }
        error
    }
}

/// Tear a running session down exactly once
///
/// Shared by the explicit stop path and the detachment path; the state
/// check under the admission lock collapses repeated triggers into one
/// engine stop and one unsubscription.
async fn teardown(
    inner: &Mutex<SessionInner>,
    engine: &dyn ForwardingEngine,
    watcher: &dyn AccessoryWatcher,
    handler: &dyn EventHandler,
    reason: &str,
) {
    let mut inner = inner.lock().await;
    if inner.state != SessionState::Running {
        log::debug!("Teardown ({}) ignored: session not running", reason);
        return;
    }

    inner.state = SessionState::Stopping;
    handler
        .on_event(SessionEvent::StateChanged {
            old: SessionState::Running,
            new: SessionState::Stopping,
        })
        .await;

    engine.stop();

    if let Some(id) = inner.subscription.take() {
        if let Err(e) = watcher.unsubscribe(id) {
            // Non-fatal housekeeping failure
            log::warn!("Listener unsubscription failed: {}", e);
        }
    }

    inner.state = SessionState::Idle;
    handler
        .on_event(SessionEvent::StateChanged {
            old: SessionState::Stopping,
            new: SessionState::Idle,
        })
        .await;
    handler
        .on_event(SessionEvent::Stopped {
            reason: reason.to_string(),
        })
        .await;
}
