//! Linux-specific helpers for the tethering interface

use std::net::IpAddr;
use std::process::Command;

use crate::error::{Error, Result};

/// Check if the TUN kernel facility is available
pub fn is_tun_available() -> bool {
    std::path::Path::new("/dev/net/tun").exists()
}

/// Assign a DNS resolver address to an interface
///
/// Uses `resolvectl` so the assignment is scoped to the interface and
/// disappears with it.
pub fn set_dns_server(interface: &str, server: IpAddr) -> Result<()> {
    let output = Command::new("resolvectl")
        .args(["dns", interface, &server.to_string()])
        .output()
        .map_err(|e| Error::Dns(format!("failed to run resolvectl: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Dns(format!(
            "resolvectl dns {} {} failed: {}",
            interface,
            server,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    log::info!("Assigned DNS server {} to {}", server, interface);
    Ok(())
}
