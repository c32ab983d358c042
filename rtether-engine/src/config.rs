//! Configuration types for the tethering session

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration structure
///
/// # Example Configuration
///
/// ```toml
/// [session]
/// interface = "rtether0"
/// mtu = 1500
/// prefix_len = 30
/// routes = ["0.0.0.0/0"]
/// dns = ["8.8.8.8"]
///
/// [accessory]
/// device = "/dev/usb_accessory"
/// poll_interval_ms = 1000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session/interface settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Accessory host settings
    #[serde(default)]
    pub accessory: AccessoryConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.session.validate()
    }

    /// Generate a sample configuration
    pub fn sample() -> String {
        r#"# Rtether Configuration

# Settings for the tethering interface and session
[session]
# Interface name
interface = "rtether0"

# MTU for the tethering interface (default: 1500)
mtu = 1500

# Prefix length for the local address (default: 30)
prefix_len = 30

# Networks routed through the tethering interface
routes = ["0.0.0.0/0"]

# DNS resolvers assigned to the interface
dns = ["8.8.8.8"]

# Settings for the accessory transport
[accessory]
# Accessory device node
device = "/dev/usb_accessory"

# How often to check the accessory for detachment, in milliseconds
poll_interval_ms = 1000
"#
        .to_string()
    }
}

/// Session and interface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the tethering interface
    #[serde(default = "default_interface")]
    pub interface: String,

    /// MTU for the tethering interface
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Prefix length applied to the local address
    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    /// Networks routed through the interface
    #[serde(default = "default_routes")]
    pub routes: Vec<IpNet>,

    /// DNS resolvers assigned to the interface
    #[serde(default = "default_dns")]
    pub dns: Vec<IpAddr>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            mtu: default_mtu(),
            prefix_len: default_prefix_len(),
            routes: default_routes(),
            dns: default_dns(),
        }
    }
}

impl SessionConfig {
    /// Validate the session settings
    pub fn validate(&self) -> Result<()> {
        if self.mtu < 576 {
            return Err(Error::Config(format!(
                "MTU {} is too small (minimum 576)",
                self.mtu
            )));
        }

        if self.prefix_len == 0 || self.prefix_len > 32 {
            return Err(Error::Config(format!(
                "prefix length {} is invalid (1-32)",
                self.prefix_len
            )));
        }

        Ok(())
    }
}

/// Accessory host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryConfig {
    /// Accessory device node opened for the transport
    #[serde(default = "default_device")]
    pub device: PathBuf,

    /// Detachment poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Derive the local interface address from the accessory serial
///
/// The accessory reports the tunnel address this side should use in its
/// serial field; this is the only place the serial string is read as an
/// address. A negotiated addressing scheme would replace this function
/// without touching the rest of the session setup.
pub fn peer_address(serial: &str) -> Result<Ipv4Addr> {
    serial.trim().parse().map_err(|_| {
        Error::InterfaceEstablishment(tether_tun::Error::InvalidAddress(format!(
            "accessory serial {:?} is not an IPv4 address",
            serial
        )))
    })
}

fn default_interface() -> String {
    "rtether0".to_string()
}

fn default_mtu() -> u16 {
    1500
}

fn default_prefix_len() -> u8 {
    30
}

fn default_routes() -> Vec<IpNet> {
    vec!["0.0.0.0/0".parse().expect("valid default route")]
}

fn default_dns() -> Vec<IpAddr> {
    vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/usb_accessory")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.interface, "rtether0");
        assert_eq!(config.session.mtu, 1500);
        assert_eq!(config.session.prefix_len, 30);
        assert_eq!(config.session.routes, vec!["0.0.0.0/0".parse::<IpNet>().unwrap()]);
        assert_eq!(
            config.session.dns,
            vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]
        );
        assert_eq!(config.accessory.device, PathBuf::from("/dev/usb_accessory"));
    }

    #[test]
    fn test_sample_config_parses() {
        let config = Config::from_toml(&Config::sample()).unwrap();
        assert_eq!(config.session.mtu, 1500);
        assert_eq!(config.accessory.poll_interval_ms, 1000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml("[session]\nmtu = 1400\n").unwrap();
        assert_eq!(config.session.mtu, 1400);
        assert_eq!(config.session.prefix_len, 30);
    }

    #[test]
    fn test_validate_rejects_tiny_mtu() {
        let result = Config::from_toml("[session]\nmtu = 100\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let result = Config::from_toml("[session]\nprefix_len = 40\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_peer_address_from_serial() {
        assert_eq!(
            peer_address("10.0.0.2").unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
        assert_eq!(
            peer_address("  10.0.0.2 ").unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
    }

    #[test]
    fn test_peer_address_rejects_non_address_serial() {
        assert!(matches!(
            peer_address("SN-12345"),
            Err(Error::InterfaceEstablishment(_))
        ));
        // IPv6 literals are not valid local addresses for the interface
        assert!(peer_address("fd00::2").is_err());
    }
}
