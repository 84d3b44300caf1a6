//! Insertion-ordered registry behind a single mutex.

use super::EventRegistry;
use crate::subscription::{Subscription, SubscriptionId};
use crate::{Error, EventEnvelope, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// A thread-safe registry keeping subscriptions in registration order.
///
/// Every operation takes the lock only for the duration of the scan or
/// mutation; callers receive owned snapshots.
#[derive(Debug, Default)]
pub struct OrderedRegistry {
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
}

impl OrderedRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscriptions: Mutex::new(Vec::with_capacity(capacity)),
        }
    }
}

impl EventRegistry for OrderedRegistry {
    fn register(&self, subscription: Arc<Subscription>) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.iter().any(|s| s.id() == subscription.id()) {
            return Err(Error::DuplicateSubscription {
                id: subscription.id().as_uuid(),
            });
        }

        trace!(subscription_id = %subscription.id(), "Registering subscription");
        subscriptions.push(subscription);
        Ok(())
    }

    fn matching(&self, envelope: &EventEnvelope) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.matches(envelope))
            .cloned()
            .collect()
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        match subscriptions.iter().position(|s| s.id() == id) {
            Some(index) => {
                subscriptions.remove(index);
                true
            }
            None => false,
        }
    }

    fn remove_many(&self, ids: &[SubscriptionId]) -> usize {
        if ids.is_empty() {
            return 0;
        }

        let ids: HashSet<_> = ids.iter().copied().collect();
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| !ids.contains(&s.id()));
        before - subscriptions.len()
    }

    fn remove_where(&self, predicate: &dyn Fn(&Subscription) -> bool) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| !predicate(s));
        before - subscriptions.len()
    }

    fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.subscriptions.lock().clone()
    }

    fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn clear(&self) {
        let removed = std::mem::take(&mut *self.subscriptions.lock());
        debug!(count = removed.len(), "Registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::OwnerId;
    use crate::{Dispatcher, Event};

    #[derive(Debug)]
    struct TestEvent;

    impl Event for TestEvent {
        fn event_type() -> &'static str {
            "TestEvent"
        }
    }

    #[derive(Debug)]
    struct AnotherEvent;

    impl Event for AnotherEvent {
        fn event_type() -> &'static str {
            "AnotherEvent"
        }
    }

    fn subscription<T: Event>(owner: OwnerId) -> Arc<Subscription> {
        Arc::new(
            Subscription::builder()
                .accepts::<T>()
                .owner(owner)
                .handler(|_| {})
                .dispatcher(Dispatcher::new("registry"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_register_and_match_in_order() {
        let registry = OrderedRegistry::new();
        let owner = OwnerId::new();
        let first = subscription::<TestEvent>(owner);
        let other = subscription::<AnotherEvent>(owner);
        let second = subscription::<TestEvent>(owner);

        registry.register(first.clone()).unwrap();
        registry.register(other).unwrap();
        registry.register(second.clone()).unwrap();

        let matched: Vec<_> = registry
            .matching(&EventEnvelope::new(TestEvent))
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(matched, vec![first.id(), second.id()]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = OrderedRegistry::new();
        let sub = subscription::<TestEvent>(OwnerId::new());

        registry.register(sub.clone()).unwrap();
        let err = registry.register(sub.clone()).unwrap_err();

        assert!(matches!(err, Error::DuplicateSubscription { id } if id == sub.id().as_uuid()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_removals_are_idempotent() {
        let registry = OrderedRegistry::with_capacity(4);
        let owner = OwnerId::new();
        let a = subscription::<TestEvent>(owner);
        let b = subscription::<TestEvent>(owner);
        let c = subscription::<AnotherEvent>(OwnerId::new());
        for s in [&a, &b, &c] {
            registry.register(s.clone()).unwrap();
        }

        assert!(registry.remove(a.id()));
        assert!(!registry.remove(a.id()));

        assert_eq!(registry.remove_many(&[a.id(), b.id()]), 1);
        assert_eq!(registry.remove_many(&[]), 0);

        assert_eq!(registry.remove_where(&|s: &Subscription| s.owner() == owner), 0);
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = OrderedRegistry::new();
        registry.register(subscription::<TestEvent>(OwnerId::new())).unwrap();

        let snapshot = registry.snapshot();
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot().is_empty());
    }
}
