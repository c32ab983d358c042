//! Integration tests for tether-tun
//!
//! # Permission Requirements
//!
//! The establishment tests require elevated privileges to create TUN
//! devices and modify routing tables, and are marked with `#[ignore]`
//! by default.
//!
//! ```bash
//! # Option 1: Run as root
//! sudo cargo test -p tether-tun --test integration -- --ignored
//!
//! # Option 2: Add CAP_NET_ADMIN capability to the test binary
//! cargo test -p tether-tun --test integration --no-run
//! sudo setcap cap_net_admin+ep target/debug/deps/integration-*
//! cargo test -p tether-tun --test integration -- --ignored
//! ```

use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;

use tether_tun::{TunConfig, TunDevice};

#[test]
fn test_config_for_tethering_defaults() {
    let config = TunConfig::builder()
        .ipv4(Ipv4Addr::new(10, 0, 0, 2), 30)
        .route("0.0.0.0/0".parse().unwrap())
        .dns_server("8.8.8.8".parse().unwrap())
        .build()
        .unwrap();

    assert_eq!(config.mtu, tether_tun::DEFAULT_MTU);
    assert!(config.routes[0].prefix_len() == 0);
}

#[tokio::test]
#[ignore]
async fn test_privileged_establish_and_transfer() {
    let config = TunConfig::builder()
        .name("rtether-test0")
        .ipv4(Ipv4Addr::new(10, 99, 99, 2), 30)
        .mtu(1500)
        .build()
        .unwrap();

    let device = TunDevice::establish(config).await.unwrap();
    assert_eq!(device.name(), "rtether-test0");
    assert_eq!(device.mtu(), 1500);

    // Ownership transfer yields a valid descriptor that outlives the device
    let fd = device.into_fd().unwrap();
    assert!(fd.as_raw_fd() >= 0);
    drop(fd); // interface disappears here
}

#[tokio::test]
#[ignore]
async fn test_privileged_establish_rejects_unconfigured() {
    // No address configured: establishment must fail before touching the
    // platform, leaving nothing behind.
    let config = TunConfig {
        name: Some("rtether-test1".into()),
        ..Default::default()
    };
    assert!(TunDevice::establish(config).await.is_err());
}
