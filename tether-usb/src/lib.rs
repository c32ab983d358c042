//! USB accessory transport layer for reverse tethering
//!
//! This crate models the attached accessory (the peer device at the far
//! end of the tethered link) and the two platform services the session
//! controller consumes:
//!
//! - [`AccessoryHost`]: opens the accessory transport, yielding a raw
//!   descriptor with exclusive ownership
//! - [`AccessoryWatcher`]: a cancellable subscription to asynchronous
//!   accessory notifications (detachment, permission results), delivered
//!   over a channel so the consumer processes them as ordinary inputs
//!
//! The [`mock`] module provides test doubles with event and failure
//! injection; [`chardev`] provides a host backed by an accessory device
//! node.

pub mod chardev;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod mock;
pub mod watch;

pub use chardev::CharDevHost;
pub use descriptor::AccessoryDescriptor;
pub use error::{Error, Result};
pub use host::AccessoryHost;
pub use watch::{AccessoryEvent, AccessoryWatcher, Subscription, SubscriptionId};
