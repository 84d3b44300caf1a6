//! Subscription registry.
//!
//! The registry owns the live set of subscriptions and answers "which of them
//! match this event". It is the only state shared between dispatchers, so
//! implementations must be thread-safe and must never run handlers while
//! holding their lock.

use crate::subscription::{Subscription, SubscriptionId};
use crate::{EventEnvelope, Result};
use std::fmt::Debug;
use std::sync::Arc;

mod ordered;
pub use ordered::OrderedRegistry;

/// Trait for subscription registries.
pub trait EventRegistry: Send + Sync + Debug {
    /// Register a subscription; fails on a duplicate id
    fn register(&self, subscription: Arc<Subscription>) -> Result<()>;

    /// Point-in-time snapshot of the subscriptions matching `envelope`, in
    /// registration order
    fn matching(&self, envelope: &EventEnvelope) -> Vec<Arc<Subscription>>;

    /// Remove one subscription; `false` if it was not registered
    fn remove(&self, id: SubscriptionId) -> bool;

    /// Remove every listed subscription in one pass; returns how many were removed
    fn remove_many(&self, ids: &[SubscriptionId]) -> usize;

    /// Remove every subscription for which `predicate` holds
    fn remove_where(&self, predicate: &dyn Fn(&Subscription) -> bool) -> usize;

    /// Snapshot of all subscriptions in registration order
    fn snapshot(&self) -> Vec<Arc<Subscription>>;

    /// Number of live subscriptions
    fn len(&self) -> usize;

    /// Whether there are no live subscriptions
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all subscriptions
    fn clear(&self);
}
