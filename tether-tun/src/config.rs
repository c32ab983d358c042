//! TUN interface configuration

use std::net::{IpAddr, Ipv4Addr};

use ipnet::IpNet;

use crate::error::{Error, Result};
use crate::DEFAULT_MTU;

/// IPv4 address configuration for the interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Config {
    /// The IPv4 address to assign to the interface
    pub address: Ipv4Addr,
    /// Network prefix length (e.g., 30 for /30)
    pub prefix_len: u8,
}

impl Ipv4Config {
    /// Create a new IPv4 configuration
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
        }
    }

    /// Get the network mask as an Ipv4Addr
    pub fn netmask(&self) -> Ipv4Addr {
        if self.prefix_len == 0 {
            return Ipv4Addr::UNSPECIFIED;
        }
        if self.prefix_len >= 32 {
            return Ipv4Addr::BROADCAST;
        }
        let mask = !((1u32 << (32 - self.prefix_len)) - 1);
        Ipv4Addr::from(mask)
    }
}

/// Configuration for establishing the tethering interface
///
/// The whole configuration is applied as one unit: if any part of it
/// cannot be applied, nothing of the interface survives.
#[derive(Debug, Clone)]
pub struct TunConfig {
    /// Interface name (optional, auto-generated if not specified)
    pub name: Option<String>,
    /// IPv4 configuration
    pub ipv4: Option<Ipv4Config>,
    /// Networks routed through the interface
    pub routes: Vec<IpNet>,
    /// DNS resolver addresses assigned to the interface
    pub dns_servers: Vec<IpAddr>,
    /// Maximum transmission unit
    pub mtu: u16,
}

impl Default for TunConfig {
    fn default() -> Self {
        Self {
            name: None,
            ipv4: None,
            routes: Vec::new(),
            dns_servers: Vec::new(),
            mtu: DEFAULT_MTU,
        }
    }
}

impl TunConfig {
    /// Create a new configuration builder
    pub fn builder() -> TunConfigBuilder {
        TunConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let ipv4 = self
            .ipv4
            .as_ref()
            .ok_or_else(|| Error::Config("an IPv4 address must be configured".into()))?;

        if ipv4.prefix_len > 32 {
            return Err(Error::InvalidPrefix(format!(
                "IPv4 prefix length {} is invalid (max 32)",
                ipv4.prefix_len
            )));
        }

        if self.mtu < 68 {
            return Err(Error::Config(format!(
                "MTU {} is too small (minimum 68)",
                self.mtu
            )));
        }

        Ok(())
    }
}

/// Builder for TunConfig
#[derive(Debug, Default)]
pub struct TunConfigBuilder {
    config: TunConfig,
}

impl TunConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Set the IPv4 address and prefix length
    pub fn ipv4(mut self, address: impl Into<Ipv4Addr>, prefix_len: u8) -> Self {
        self.config.ipv4 = Some(Ipv4Config::new(address.into(), prefix_len));
        self
    }

    /// Set the IPv4 address from a string (e.g., "10.0.0.2")
    pub fn ipv4_str(self, address: &str, prefix_len: u8) -> Result<Self> {
        let addr: Ipv4Addr = address
            .parse()
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;
        Ok(self.ipv4(addr, prefix_len))
    }

    /// Add a network to route through the interface
    pub fn route(mut self, network: IpNet) -> Self {
        self.config.routes.push(network);
        self
    }

    /// Add a DNS resolver address
    pub fn dns_server(mut self, server: IpAddr) -> Self {
        self.config.dns_servers.push(server);
        self
    }

    /// Set the MTU
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<TunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_netmask() {
        let config = Ipv4Config::new(Ipv4Addr::new(10, 0, 0, 2), 30);
        assert_eq!(config.netmask(), Ipv4Addr::new(255, 255, 255, 252));

        let config = Ipv4Config::new(Ipv4Addr::new(10, 0, 0, 1), 24);
        assert_eq!(config.netmask(), Ipv4Addr::new(255, 255, 255, 0));

        let config = Ipv4Config::new(Ipv4Addr::new(10, 0, 0, 1), 32);
        assert_eq!(config.netmask(), Ipv4Addr::new(255, 255, 255, 255));

        let config = Ipv4Config::new(Ipv4Addr::new(10, 0, 0, 1), 0);
        assert_eq!(config.netmask(), Ipv4Addr::new(0, 0, 0, 0));
    }

    #[test]
    fn test_config_builder() {
        let config = TunConfig::builder()
            .name("rtether0")
            .ipv4(Ipv4Addr::new(10, 0, 0, 2), 30)
            .route("0.0.0.0/0".parse().unwrap())
            .dns_server("8.8.8.8".parse().unwrap())
            .mtu(1500)
            .build()
            .unwrap();

        assert_eq!(config.name, Some("rtether0".to_string()));
        assert_eq!(config.mtu, 1500);
        assert_eq!(config.routes.len(), 1);
        assert!(config.routes[0].prefix_len() == 0);
        assert_eq!(config.dns_servers.len(), 1);
    }

    #[test]
    fn test_config_validation_no_address() {
        let result = TunConfig::builder().name("rtether0").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_invalid_prefix() {
        let result = TunConfig::builder()
            .ipv4(Ipv4Addr::new(10, 0, 0, 2), 33)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_invalid_mtu() {
        let result = TunConfig::builder()
            .ipv4(Ipv4Addr::new(10, 0, 0, 2), 30)
            .mtu(10)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_bad_address_literal() {
        let result = TunConfig::builder().ipv4_str("not-an-address", 30);
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }
}
