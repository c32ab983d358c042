//! Error types for the accessory layer

use std::io;
use thiserror::Error;

/// Result type alias for accessory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the accessory host
#[derive(Debug, Error)]
pub enum Error {
    /// No accessory is attached at the expected location
    #[error("accessory not attached: {0}")]
    NotAttached(String),

    /// The accessory transport could not be opened
    #[error("failed to open accessory transport: {0}")]
    Open(String),

    /// Permission to access the accessory was denied
    #[error("accessory permission denied: {0}")]
    PermissionDenied(String),

    /// Unsubscribing a subscription that is not registered
    #[error("subscription is not registered")]
    NotSubscribed,

    /// I/O error from underlying system calls
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
