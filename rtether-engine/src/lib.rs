//! Rtether Engine
//!
//! This crate provides the session lifecycle controller for a USB
//! reverse-tethering setup: it validates admission, builds the virtual
//! interface, opens the accessory transport, and hands both descriptors
//! to a packet-forwarding engine, reacting to detachment and stop
//! requests with exactly-once teardown.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  ┌─────────────────┐              ┌─────────────────────┐   │
//! │  │   rtether-cli   │              │   Future GUI App    │   │
//! │  └────────┬────────┘              └──────────┬──────────┘   │
//! │           │                                  │              │
//! │           └───────────────┬──────────────────┘              │
//! │                           ▼                                 │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                  rtether-engine                       │  │
//! │  │  - SessionController (admission, state machine)       │  │
//! │  │  - ForwardingEngine contract + RelayEngine            │  │
//! │  │  - Config (TOML configuration)                        │  │
//! │  │  - Events, Reporter (status updates, failures)        │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Library Layer                            │
//! │  ┌─────────────────┐    ┌─────────────────┐                 │
//! │  │   tether-usb    │    │   tether-tun    │                 │
//! │  │  - Accessory    │    │  - TUN device   │                 │
//! │  │  - Events       │    │  - Routes, DNS  │                 │
//! │  └─────────────────┘    └─────────────────┘                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod forward;
pub mod iface;
pub mod mock;
pub mod report;
pub mod session;

pub use config::{peer_address, AccessoryConfig, Config, SessionConfig};
pub use error::{Error, Result};
pub use event::{EventHandler, LoggingEventHandler, SessionEvent, SessionState};
pub use forward::{ForwardingEngine, RelayEngine};
pub use iface::{InterfaceConfigurator, SystemConfigurator};
pub use report::{LogReporter, Reporter};
pub use session::SessionController;
