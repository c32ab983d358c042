//! Virtual interface configurator seam
//!
//! The controller builds the tethering interface through this trait so
//! the platform facility can be replaced in tests.

use std::os::fd::OwnedFd;

use async_trait::async_trait;
use tether_tun::{TunConfig, TunDevice};

/// Establishes the virtual interface and yields its descriptor
#[async_trait]
pub trait InterfaceConfigurator: Send + Sync {
    /// Bring up an interface for the given configuration
    ///
    /// The configuration is applied as one unit: on failure nothing of
    /// the interface survives, and the error is returned for the caller
    /// to surface.
    async fn establish(
        &self,
        config: &TunConfig,
    ) -> std::result::Result<OwnedFd, tether_tun::Error>;
}

/// Configurator backed by the platform TUN facility
pub struct SystemConfigurator;

#[async_trait]
impl InterfaceConfigurator for SystemConfigurator {
    async fn establish(
        &self,
        config: &TunConfig,
    ) -> std::result::Result<OwnedFd, tether_tun::Error> {
        let device = TunDevice::establish(config.clone()).await?;
        device.into_fd()
    }
}
