//! Session events and state

use std::net::Ipv4Addr;

/// Tethering session state
///
/// `Idle` is both the initial and the only terminal state; the machine
/// is re-entrant, so a new session may start as soon as the previous one
/// has returned to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session is active
    Idle,
    /// Start request admitted, resolving the accessory
    AwaitingAccessory,
    /// Opening the accessory transport and building the interface
    Configuring,
    /// Both descriptors handed to the forwarding engine
    Running,
    /// Tearing down after a stop request or detachment
    Stopping,
}

impl SessionState {
    /// Check if a session currently holds the single-session slot
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    /// Check if forwarding is up
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::AwaitingAccessory => "Awaiting accessory...",
            SessionState::Configuring => "Configuring...",
            SessionState::Running => "Running",
            SessionState::Stopping => "Stopping...",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Events emitted by the session controller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// State changed
    StateChanged {
        old: SessionState,
        new: SessionState,
    },

    /// Session established and forwarding
    Established {
        /// Local address assigned to the tethering interface
        address: Ipv4Addr,
        /// Accessory the session is bound to
        accessory: String,
    },

    /// Session torn down
    Stopped {
        /// Reason for the teardown
        reason: String,
    },
}

/// Event handler trait for receiving session events
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle a session event
    async fn on_event(&self, event: SessionEvent);
}

/// Simple event handler that logs events
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::StateChanged { old, new } => {
                log::info!("Session state: {} -> {}", old, new);
            }
            SessionEvent::Established { address, accessory } => {
                log::info!("Tethering established: {} via {}", address, accessory);
            }
            SessionEvent::Stopped { reason } => {
                log::info!("Session stopped: {}", reason);
            }
        }
    }
}
