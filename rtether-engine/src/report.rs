//! Diagnostics reporting
//!
//! User-visible failures are surfaced through a [`Reporter`]: a stateless
//! collaborator that presents a message and never fails or blocks the
//! controller's decision path.

/// Surface a diagnostic message to the user/operator
pub trait Reporter: Send + Sync {
    /// Present the message; must not block or fail
    fn report(&self, message: &str);
}

/// Reporter that writes messages to the log
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, message: &str) {
        log::error!("{}", message);
    }
}
