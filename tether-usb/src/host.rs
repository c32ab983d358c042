//! Accessory transport opening

use std::os::fd::OwnedFd;

use crate::descriptor::AccessoryDescriptor;
use crate::error::Result;

/// Platform service that opens the transport to an attached accessory
///
/// # Implementation Notes
///
/// - `open` is a fast, synchronous platform call that either succeeds or
///   fails immediately; no retry or timeout is applied here
/// - The returned descriptor is exclusively owned by the caller; closing
///   it releases the transport
pub trait AccessoryHost: Send + Sync {
    /// Open the transport to the given accessory
    ///
    /// # Returns
    ///
    /// * `Ok(fd)` - the raw transport descriptor, exclusively owned
    /// * `Err(e)` - if the accessory is gone or the platform refuses
    fn open(&self, accessory: &AccessoryDescriptor) -> Result<OwnedFd>;
}
