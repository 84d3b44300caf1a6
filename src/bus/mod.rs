//! The EventBus implementation.
//!
//! The bus keeps the subscription registry and routes published envelopes to
//! the dispatchers of every matching subscription. Publishing never runs a
//! handler inline: each delivery is posted to the subscription's dispatcher,
//! so handlers may subscribe or unsubscribe freely.

use crate::registry::{EventRegistry, OrderedRegistry};
use crate::subscription::{OwnerId, Subscription, SubscriptionId, UnsubscribePolicy};
use crate::{Event, EventEnvelope, EventKind, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Routes events to subscriptions.
///
/// # Example
///
/// ```rust
/// use tokio_eventing::{Dispatcher, Event, EventBus, Subscription};
///
/// #[derive(Debug)]
/// struct Tick;
///
/// impl Event for Tick {
///     fn event_type() -> &'static str { "Tick" }
/// }
///
/// let dispatcher = Dispatcher::new("main");
/// let bus = EventBus::new();
///
/// bus.subscribe(
///     Subscription::builder()
///         .accepts::<Tick>()
///         .handler(|envelope| println!("got {}", envelope.event_type()))
///         .dispatcher(dispatcher.clone())
///         .build()
///         .unwrap(),
/// )
/// .unwrap();
///
/// assert_eq!(bus.publish_event(Tick), 1);
/// dispatcher.run_all_operations();
/// ```
#[derive(Debug)]
pub struct EventBus {
    registry: Arc<dyn EventRegistry>,
    events_published: AtomicU64,
    deliveries: AtomicU64,
    auto_removed: AtomicU64,
}

impl EventBus {
    /// Create a bus backed by an [`OrderedRegistry`]
    pub fn new() -> Self {
        Self::with_registry(Arc::new(OrderedRegistry::new()))
    }

    /// Create a bus backed by a custom registry
    pub fn with_registry(registry: Arc<dyn EventRegistry>) -> Self {
        Self {
            registry,
            events_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            auto_removed: AtomicU64::new(0),
        }
    }

    /// Register a subscription.
    ///
    /// Nothing is delivered as a side effect, including events published
    /// before this call.
    pub fn subscribe(&self, subscription: Subscription) -> Result<SubscriptionId> {
        let id = subscription.id();
        let owner = subscription.owner();
        let policy = subscription.policy();
        self.registry.register(Arc::new(subscription))?;

        debug!(
            subscription_id = %id,
            owner = %owner,
            policy = ?policy,
            "Subscribed"
        );
        Ok(id)
    }

    /// Publish an envelope to every matching subscription.
    ///
    /// Matching is computed on a snapshot taken once; subscriptions added
    /// during delivery do not see this event. `Auto` subscriptions are
    /// removed on match, before their handler has run. Returns the number of
    /// deliveries posted.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let matched = self.registry.matching(&envelope);
        trace!(
            event_id = %envelope.event_id(),
            event_type = envelope.event_type(),
            matched = matched.len(),
            "Publishing event"
        );

        let mut delivered = 0;
        let mut consumed = Vec::new();
        for subscription in &matched {
            let auto = subscription.policy() == UnsubscribePolicy::Auto;
            if auto {
                consumed.push(subscription.id());
            }
            if !subscription.try_claim() {
                trace!(subscription_id = %subscription.id(), "Auto subscription already claimed");
                continue;
            }

            if subscription.deliver(envelope.clone()) {
                delivered += 1;
            } else {
                warn!(
                    subscription_id = %subscription.id(),
                    dispatcher = subscription.dispatcher().name(),
                    event_type = envelope.event_type(),
                    "Delivery dropped, dispatcher no longer accepts work"
                );
            }
        }

        if !consumed.is_empty() {
            let removed = self.registry.remove_many(&consumed);
            self.auto_removed.fetch_add(removed as u64, Ordering::Relaxed);
            trace!(removed, "Removed auto subscriptions");
        }

        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Wrap `event` in a fresh envelope and publish it
    pub fn publish_event<T: Event>(&self, event: T) -> usize {
        self.publish(EventEnvelope::new(event))
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            debug!(subscription_id = %id, "Unsubscribed");
        }
        removed
    }

    /// Remove several subscriptions in one pass
    pub fn unsubscribe_many(&self, ids: &[SubscriptionId]) -> usize {
        let removed = self.registry.remove_many(ids);
        debug!(requested = ids.len(), removed, "Unsubscribed many");
        removed
    }

    /// Remove every subscription held by `owner`
    pub fn unsubscribe_owner(&self, owner: OwnerId) -> usize {
        let removed = self.registry.remove_where(&|s: &Subscription| s.owner() == owner);
        debug!(owner = %owner, removed, "Unsubscribed owner");
        removed
    }

    /// Remove the subscriptions of `owner` that would receive events of `kind`
    pub fn unsubscribe_owner_kind(&self, owner: OwnerId, kind: EventKind) -> usize {
        let removed = self
            .registry
            .remove_where(&|s: &Subscription| s.owner() == owner && s.accepts(&kind));
        debug!(owner = %owner, event_type = kind.name(), removed, "Unsubscribed owner from type");
        removed
    }

    /// Snapshot of the live subscriptions in registration order
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.registry.snapshot()
    }

    /// Counters since creation
    pub fn stats(&self) -> BusStats {
        BusStats {
            subscriptions: self.registry.len(),
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            auto_removed: self.auto_removed.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the event bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Live subscriptions
    pub subscriptions: usize,
    /// Envelopes published
    pub events_published: u64,
    /// Handler invocations posted to dispatchers
    pub deliveries: u64,
    /// Auto subscriptions removed after their match
    pub auto_removed: u64,
}

impl fmt::Display for BusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventBus Stats: {} subscriptions, {} events published, {} deliveries",
            self.subscriptions, self.events_published, self.deliveries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dispatcher, Error};
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    struct Transport;

    impl Event for Transport {
        fn event_type() -> &'static str {
            "Transport"
        }
    }

    #[derive(Debug, Clone)]
    struct Connected {
        port: u16,
    }

    impl Event for Connected {
        fn event_type() -> &'static str {
            "Connected"
        }

        fn supertypes() -> Vec<EventKind> {
            vec![EventKind::of::<Transport>()]
        }
    }

    #[derive(Debug, Clone)]
    struct Disconnected;

    impl Event for Disconnected {
        fn event_type() -> &'static str {
            "Disconnected"
        }

        fn supertypes() -> Vec<EventKind> {
            vec![EventKind::of::<Transport>()]
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&EventEnvelope) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        (seen, move |envelope: &EventEnvelope| {
            seen_clone.lock().push(envelope.event_type())
        })
    }

    #[test]
    fn test_publish_posts_and_does_not_run_inline() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let (seen, handler) = recorder();

        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(handler)
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(bus.publish_event(Connected { port: 80 }), 1);
        assert!(seen.lock().is_empty());

        assert!(dispatcher.run_all_operations());
        assert_eq!(*seen.lock(), vec!["Connected"]);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let (seen, handler) = recorder();

        assert_eq!(bus.publish_event(Connected { port: 1 }), 0);
        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(handler)
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        assert!(!dispatcher.run_all_operations());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_supertype_subscription_receives_subtypes() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let (seen, handler) = recorder();

        bus.subscribe(
            Subscription::builder()
                .accepts::<Transport>()
                .handler(handler)
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        bus.publish_event(Connected { port: 1 });
        bus.publish_event(Disconnected);
        dispatcher.run_all_operations();

        assert_eq!(*seen.lock(), vec!["Connected", "Disconnected"]);
    }

    #[test]
    fn test_auto_subscription_removed_on_match() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let (seen, handler) = recorder();

        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(handler)
                .auto_unsubscribe()
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(bus.publish_event(Connected { port: 1 }), 1);
        // Removed before the handler has run.
        assert!(bus.subscriptions().is_empty());
        assert_eq!(bus.publish_event(Connected { port: 2 }), 0);

        dispatcher.run_all_operations();
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(bus.stats().auto_removed, 1);
    }

    #[test]
    fn test_delivery_order_follows_registration() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for index in 0..3 {
            let order = order.clone();
            bus.subscribe(
                Subscription::builder()
                    .accepts::<Connected>()
                    .handler(move |_| order.lock().push(index))
                    .dispatcher(dispatcher.clone())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        }

        bus.publish_event(Connected { port: 1 });
        dispatcher.run_all_operations();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_handler_may_subscribe_during_delivery() {
        let dispatcher = Dispatcher::new("bus");
        let bus = Arc::new(EventBus::new());
        let bus_clone = bus.clone();
        let dispatcher_clone = dispatcher.clone();

        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(move |_| {
                    bus_clone
                        .subscribe(
                            Subscription::builder()
                                .accepts::<Disconnected>()
                                .handler(|_| {})
                                .dispatcher(dispatcher_clone.clone())
                                .build()
                                .unwrap(),
                        )
                        .unwrap();
                })
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        bus.publish_event(Connected { port: 1 });
        dispatcher.run_all_operations();
        assert_eq!(bus.subscriptions().len(), 2);
    }

    #[test]
    fn test_unsubscribe_variants() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let owner = OwnerId::named("owner");
        let other = OwnerId::new();

        let subscribe = |owner: OwnerId, kind: EventKind| {
            bus.subscribe(
                Subscription::builder()
                    .accepts_kinds([kind])
                    .owner(owner)
                    .handler(|_| {})
                    .dispatcher(dispatcher.clone())
                    .build()
                    .unwrap(),
            )
            .unwrap()
        };

        let first = subscribe(owner, EventKind::of::<Connected>());
        subscribe(owner, EventKind::of::<Transport>());
        subscribe(owner, EventKind::of::<Disconnected>());
        let foreign = subscribe(other, EventKind::of::<Connected>());

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));

        // Transport accepts Connected through the hierarchy.
        assert_eq!(bus.unsubscribe_owner_kind(owner, EventKind::of::<Connected>()), 1);
        assert_eq!(bus.unsubscribe_owner(owner), 1);
        assert_eq!(bus.unsubscribe_owner(owner), 0);

        assert_eq!(bus.unsubscribe_many(&[foreign, first]), 1);
        assert!(bus.subscriptions().is_empty());
    }

    #[test]
    fn test_duplicate_subscription_id_rejected() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let id = SubscriptionId::new();
        let build = || {
            Subscription::builder()
                .id(id)
                .accepts::<Connected>()
                .handler(|_| {})
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap()
        };

        bus.subscribe(build()).unwrap();
        let err = bus.subscribe(build()).unwrap_err();
        assert!(matches!(err, Error::DuplicateSubscription { .. }));
    }

    #[test]
    fn test_completed_dispatcher_drops_delivery() {
        let dispatcher = Dispatcher::new("closed");
        let bus = EventBus::new();
        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(|_| {})
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        dispatcher.complete();
        assert_eq!(bus.publish_event(Connected { port: 1 }), 0);
    }

    #[test]
    fn test_stats() {
        let dispatcher = Dispatcher::new("bus");
        let bus = EventBus::new();
        let port = Arc::new(Mutex::new(0));
        let port_clone = port.clone();

        bus.subscribe(
            Subscription::builder()
                .accepts::<Connected>()
                .handler(move |envelope| {
                    if let Some(event) = envelope.downcast_ref::<Connected>() {
                        *port_clone.lock() = event.port;
                    }
                })
                .dispatcher(dispatcher.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

        bus.publish_event(Connected { port: 8080 });
        bus.publish_event(Disconnected);
        dispatcher.run_all_operations();

        let stats = bus.stats();
        assert_eq!(*port.lock(), 8080);
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.deliveries, 1);
        assert!(stats.to_string().contains("1 subscriptions"));
    }
}
