//! Virtual network interface management for reverse tethering
//!
//! This crate builds and brings up the TUN interface that carries the
//! tethered traffic: address assignment, MTU, catch-all routing, and DNS
//! are applied as a single unit, and the interface descriptor can be
//! handed off to a forwarding component with exclusive ownership.
//!
//! # Platform Requirements
//!
//! - Root privileges or `CAP_NET_ADMIN` capability
//! - TUN kernel module loaded (`modprobe tun`)
//! - `resolvectl` available when a DNS server is configured
//!
//! # Example
//!
//! ```ignore
//! use tether_tun::{TunConfig, TunDevice};
//!
//! let config = TunConfig::builder()
//!     .name("rtether0")
//!     .ipv4_str("10.0.0.2", 30)?
//!     .route("0.0.0.0/0".parse()?)
//!     .dns_server("8.8.8.8".parse()?)
//!     .build()?;
//!
//! let device = TunDevice::establish(config).await?;
//! let fd = device.into_fd()?; // exclusive ownership moves to the caller
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod route;

#[cfg(target_os = "linux")]
pub mod linux;

pub use config::{TunConfig, TunConfigBuilder};
pub use device::TunDevice;
pub use error::{Error, Result};
pub use route::{Route, RouteManager};

/// Default MTU for the tethering interface
pub const DEFAULT_MTU: u16 = 1500;
