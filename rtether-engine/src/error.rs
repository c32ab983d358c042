//! Error types for the session lifecycle controller

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a tethering session
///
/// A failed `start` maps one-to-one onto these variants; `Ok(())` means
/// the session was accepted and is now running.
#[derive(Debug, Error)]
pub enum Error {
    /// No accessory reference was supplied with the start request
    #[error("no accessory supplied with the start request")]
    AccessoryUnavailable,

    /// A session is already active; admission refused
    #[error("a tethering session is already active")]
    AlreadyRunning,

    /// The accessory transport could not be opened
    #[error("failed to open accessory transport: {0}")]
    AccessoryOpen(#[source] tether_usb::Error),

    /// The virtual interface could not be established
    #[error("failed to establish virtual interface: {0}")]
    InterfaceEstablishment(#[source] tether_tun::Error),

    /// Housekeeping error while removing the event subscription
    #[error("listener is not subscribed")]
    NotSubscribed,

    /// The forwarding engine rejected the descriptor handoff
    #[error("forwarding engine rejected handoff: {0}")]
    Forward(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to parse configuration file
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Message surfaced to the user for errors they should see
    ///
    /// Returns `None` for internal housekeeping errors that are logged
    /// but never presented.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Error::AccessoryUnavailable => {
                Some("No accessory device available. Reattach and try again.".into())
            }
            Error::AlreadyRunning => {
                Some("A tethering session is already running.".into())
            }
            Error::AccessoryOpen(e) => {
                Some(format!("Could not open the accessory device: {}", e))
            }
            Error::InterfaceEstablishment(e) => {
                Some(format!("Could not bring up the tethering interface: {}", e))
            }
            Error::Forward(e) => {
                Some(format!("Could not start packet forwarding: {}", e))
            }
            Error::NotSubscribed
            | Error::Config(_)
            | Error::ConfigParse(_)
            | Error::Io(_) => None,
        }
    }

    /// Check if this error rejected a start request at admission,
    /// before any resource was touched
    pub fn is_rejected_at_admission(&self) -> bool {
        matches!(self, Error::AccessoryUnavailable | Error::AlreadyRunning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_errors_have_messages() {
        assert!(Error::AccessoryUnavailable.user_message().is_some());
        assert!(Error::AlreadyRunning.user_message().is_some());
        assert!(Error::AccessoryOpen(tether_usb::Error::NotSubscribed)
            .user_message()
            .is_some());
    }

    #[test]
    fn test_housekeeping_errors_are_silent() {
        assert!(Error::NotSubscribed.user_message().is_none());
        assert!(Error::Config("bad".into()).user_message().is_none());
    }

    #[test]
    fn test_admission_rejections() {
        assert!(Error::AccessoryUnavailable.is_rejected_at_admission());
        assert!(Error::AlreadyRunning.is_rejected_at_admission());
        assert!(!Error::NotSubscribed.is_rejected_at_admission());
    }
}
