//! Accessory event subscriptions
//!
//! Notifications about the attached accessory arrive asynchronously from
//! the platform. A subscription hands the consumer a channel receiver;
//! channel ordering serializes events within a subscription, while the
//! consumer decides on which task to process them.

use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;

/// Opaque identifier of an active subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Notifications raised for the currently attached accessory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessoryEvent {
    /// The accessory was detached from the host
    Detached,

    /// The platform resolved a pending permission request
    PermissionResult {
        /// Whether access to the accessory was granted
        granted: bool,
    },
}

/// An active subscription and its event channel
pub struct Subscription {
    /// Identifier to pass back to [`AccessoryWatcher::unsubscribe`]
    pub id: SubscriptionId,
    /// Event receiver; closed once the subscription is removed
    pub events: UnboundedReceiver<AccessoryEvent>,
}

/// Platform service delivering accessory notifications
///
/// Events for one subscription are delivered in order and never
/// concurrently with each other, but they are not serialized with calls
/// the consumer makes on its own; a detachment can race an in-flight
/// operation and must be handled as a concurrent input.
pub trait AccessoryWatcher: Send + Sync {
    /// Subscribe to accessory notifications
    fn subscribe(&self) -> Result<Subscription>;

    /// Remove a subscription
    ///
    /// # Returns
    ///
    /// * `Err(Error::NotSubscribed)` if the id is not registered; callers
    ///   that cannot rule out a prior removal should treat this as a
    ///   warning, not a failure
    fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}
