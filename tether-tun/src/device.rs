//! TUN device establishment
//!
//! This module wraps the `tun-rs` crate and applies the full interface
//! configuration (address, MTU, routes, DNS) as one unit. If any step
//! fails, everything already built is discarded: the kernel removes the
//! interface together with its routes when the descriptor closes, so no
//! partial interface can survive a failed establishment.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::config::TunConfig;
use crate::error::{Error, Result};
use crate::route::{Route, RouteManager};

/// Information about an established TUN device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Interface name
    pub name: String,
    /// MTU
    pub mtu: u16,
}

/// An established tethering interface, owning its descriptor
pub struct TunDevice {
    inner: tun_rs::SyncDevice,
    info: DeviceInfo,
}

impl TunDevice {
    /// Establish the tethering interface from a configuration
    ///
    /// Creates the device, assigns the address and MTU, installs the
    /// configured routes, and assigns the DNS resolvers. On any failure
    /// the device built so far is dropped and an error is returned; the
    /// caller never has to clean up a half-configured interface.
    ///
    /// Requires root or `CAP_NET_ADMIN`.
    pub async fn establish(config: TunConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(target_os = "linux")]
        if !crate::linux::is_tun_available() {
            return Err(Error::DeviceCreation(
                "/dev/net/tun is not available (is the tun module loaded?)".into(),
            ));
        }

        let mut builder = tun_rs::DeviceBuilder::new();

        if let Some(ref name) = config.name {
            builder = builder.name(name);
        }

        // validate() guarantees the address is present
        let ipv4 = config
            .ipv4
            .as_ref()
            .ok_or_else(|| Error::Config("an IPv4 address must be configured".into()))?;
        builder = builder.ipv4(ipv4.address, ipv4.prefix_len, None);
        builder = builder.mtu(config.mtu);

        let device = builder.build_sync().map_err(|e| {
            let msg = e.to_string();
            if msg.contains("ermission") {
                Error::PermissionDenied(msg)
            } else {
                Error::DeviceCreation(msg)
            }
        })?;

        let name = device
            .name()
            .map_err(|e| Error::DeviceCreation(e.to_string()))?;

        if !config.routes.is_empty() {
            let routes = RouteManager::new().await?;
            for network in &config.routes {
                let route = Route::interface_route(*network, &name);
                routes.add(&route).await?;
            }
        }

        #[cfg(target_os = "linux")]
        for server in &config.dns_servers {
            crate::linux::set_dns_server(&name, *server)?;
        }

        log::info!(
            "Established TUN device {} ({}/{}, MTU {})",
            name,
            ipv4.address,
            ipv4.prefix_len,
            config.mtu
        );

        Ok(Self {
            inner: device,
            info: DeviceInfo {
                name,
                mtu: config.mtu,
            },
        })
    }

    /// Get the device name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get the MTU
    pub fn mtu(&self) -> u16 {
        self.info.mtu
    }

    /// Get device information
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Get the underlying file descriptor without giving up ownership
    pub fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.inner.as_raw_fd()
    }

    /// Consume the device and transfer exclusive ownership of its descriptor
    ///
    /// The returned descriptor shares the open file description with the
    /// one the device held, so the interface (and its routes) stays alive
    /// after the device-held descriptor closes on drop.
    pub fn into_fd(self) -> Result<OwnedFd> {
        // SAFETY: dup returns a fresh descriptor we own exclusively
        let fd = unsafe { libc::dup(self.inner.as_raw_fd()) };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        // SAFETY: fd was just returned by a successful dup
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

impl std::fmt::Debug for TunDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice").field("info", &self.info).finish()
    }
}
