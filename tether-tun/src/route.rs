//! Route management for the tethering interface
//!
//! Routes are installed against the interface by name; the kernel removes
//! them automatically when the interface disappears with its descriptor.

use std::ffi::CString;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::{Error, Result};

/// Convert an interface name to its index
fn get_interface_index(name: &str) -> Result<u32> {
    let c_name =
        CString::new(name).map_err(|_| Error::Config("invalid interface name".into()))?;

    // SAFETY: if_nametoindex is safe to call with a valid C string
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    if index == 0 {
        return Err(Error::Route(format!(
            "interface '{}' not found (os error {})",
            name,
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        )));
    }

    Ok(index)
}

/// A network route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination network (CIDR notation internally)
    pub destination: IpNet,
    /// Gateway address (None for direct/interface routes)
    pub gateway: Option<IpAddr>,
    /// Interface name
    pub interface: Option<String>,
}

impl Route {
    /// Create an interface route (no gateway, traffic goes directly to interface)
    pub fn interface_route(destination: IpNet, interface: impl Into<String>) -> Self {
        Self {
            destination,
            gateway: None,
            interface: Some(interface.into()),
        }
    }

    /// Check if this is a default (catch-all) route
    pub fn is_default(&self) -> bool {
        self.destination.prefix_len() == 0
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(ref gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        if let Some(ref iface) = self.interface {
            write!(f, " dev {}", iface)?;
        }
        Ok(())
    }
}

/// Route manager for adding/removing routes
///
/// Uses the `net-route` crate for route manipulation.
pub struct RouteManager {
    handle: net_route::Handle,
}

impl RouteManager {
    /// Create a new route manager
    ///
    /// Requires root or `CAP_NET_ADMIN`.
    pub async fn new() -> Result<Self> {
        let handle = net_route::Handle::new()
            .map_err(|e| Error::Route(format!("failed to create route handle: {}", e)))?;

        Ok(Self { handle })
    }

    /// Add a route to the routing table
    pub async fn add(&self, route: &Route) -> Result<()> {
        let mut net_route =
            net_route::Route::new(route.destination.addr(), route.destination.prefix_len());

        if let Some(gw) = route.gateway {
            net_route = net_route.with_gateway(gw);
        }

        if let Some(ref iface) = route.interface {
            let ifindex = get_interface_index(iface)?;
            net_route = net_route.with_ifindex(ifindex);
        }

        match self.handle.add(&net_route).await {
            Ok(()) => {
                log::info!("Added route: {}", route);
            }
            Err(e) => {
                let err_str = e.to_string();
                // Ignore EEXIST - the route is already in place
                if err_str.contains("File exists") || err_str.contains("os error 17") {
                    log::debug!("Route already exists: {}", route);
                } else {
                    return Err(Error::Route(format!("failed to add route: {}", e)));
                }
            }
        }

        Ok(())
    }

    /// Remove a route from the routing table
    pub async fn delete(&self, route: &Route) -> Result<()> {
        let mut net_route =
            net_route::Route::new(route.destination.addr(), route.destination.prefix_len());

        if let Some(gw) = route.gateway {
            net_route = net_route.with_gateway(gw);
        }

        if let Some(ref iface) = route.interface {
            if let Ok(ifindex) = get_interface_index(iface) {
                net_route = net_route.with_ifindex(ifindex);
            }
            // Interface may already be gone during teardown
        }

        self.handle
            .delete(&net_route)
            .await
            .map_err(|e| Error::Route(format!("failed to delete route: {}", e)))?;

        log::info!("Deleted route: {}", route);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_route() {
        let network: IpNet = "0.0.0.0/0".parse().unwrap();
        let route = Route::interface_route(network, "rtether0");

        assert_eq!(route.interface, Some("rtether0".to_string()));
        assert!(route.gateway.is_none());
        assert!(route.is_default());
    }

    #[test]
    fn test_route_display() {
        let network: IpNet = "10.0.0.0/30".parse().unwrap();
        let route = Route::interface_route(network, "rtether0");

        let display = format!("{}", route);
        assert!(display.contains("10.0.0.0/30"));
        assert!(display.contains("dev rtether0"));
    }
}
