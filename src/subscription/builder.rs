//! Builder for subscriptions.

use super::{Handler, OwnerId, Subscription, SubscriptionId, UnsubscribePolicy};
use crate::{Dispatcher, Error, Event, EventEnvelope, EventKind, EventSet, Result};
use std::fmt;
use std::sync::Arc;

/// Builder for [`Subscription`]s.
///
/// Accepted kinds and a handler are required. The owner defaults to a fresh
/// anonymous [`OwnerId`], the policy to [`UnsubscribePolicy::Manual`] and the
/// dispatcher to the ambient one at [`build`](Self::build) time.
#[derive(Default)]
pub struct SubscriptionBuilder {
    id: Option<SubscriptionId>,
    owner: Option<OwnerId>,
    accepted: Vec<EventKind>,
    handler: Option<Handler>,
    policy: UnsubscribePolicy,
    dispatcher: Option<Dispatcher>,
    exact: bool,
}

impl SubscriptionBuilder {
    /// Create a new subscription builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific id instead of a generated one
    pub fn id(mut self, id: SubscriptionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the owner
    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Accept events of type `T` and its subtypes
    pub fn accepts<T: Event>(mut self) -> Self {
        self.accepted.push(EventKind::of::<T>());
        self
    }

    /// Accept every type in the set `S`
    pub fn accepts_all<S: EventSet>(mut self) -> Self {
        self.accepted.extend(S::kinds());
        self
    }

    /// Accept the given kinds
    pub fn accepts_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.accepted.extend(kinds);
        self
    }

    /// Match only the accepted concrete kinds, not their subtypes
    pub fn exact_kinds(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Set the handler
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set an already type-erased handler
    pub fn boxed_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the unsubscribe policy
    pub fn policy(mut self, policy: UnsubscribePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`UnsubscribePolicy::Auto`]
    pub fn auto_unsubscribe(self) -> Self {
        self.policy(UnsubscribePolicy::Auto)
    }

    /// Set the dispatcher the handler runs on
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Build the subscription
    pub fn build(self) -> Result<Subscription> {
        let mut accepted: Vec<EventKind> = Vec::with_capacity(self.accepted.len());
        for kind in self.accepted {
            if !accepted.contains(&kind) {
                accepted.push(kind);
            }
        }
        if accepted.is_empty() {
            return Err(Error::invalid_subscription("no event types accepted"));
        }

        let handler = self
            .handler
            .ok_or_else(|| Error::invalid_subscription("no handler supplied"))?;

        let dispatcher = self
            .dispatcher
            .or_else(Dispatcher::current)
            .ok_or_else(|| {
                Error::invalid_subscription("no dispatcher supplied and none is ambient")
            })?;

        Ok(Subscription::from_parts(
            self.id.unwrap_or_default(),
            self.owner.unwrap_or_default(),
            accepted,
            handler,
            self.policy,
            dispatcher,
            self.exact,
        ))
    }
}

impl fmt::Debug for SubscriptionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBuilder")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("accepted", &self.accepted)
            .field("has_handler", &self.handler.is_some())
            .field("policy", &self.policy)
            .field("exact", &self.exact)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping;

    impl Event for Ping {
        fn event_type() -> &'static str {
            "Ping"
        }
    }

    #[derive(Debug)]
    struct Pong;

    impl Event for Pong {
        fn event_type() -> &'static str {
            "Pong"
        }
    }

    #[test]
    fn test_builder_defaults() {
        let dispatcher = Dispatcher::new("builder");
        let subscription = Subscription::builder()
            .accepts::<Ping>()
            .handler(|_| {})
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        assert_eq!(subscription.policy(), UnsubscribePolicy::Manual);
        assert_eq!(subscription.accepted_types(), &[EventKind::of::<Ping>()]);
    }

    #[test]
    fn test_builder_dedupes_kinds() {
        let subscription = Subscription::builder()
            .accepts::<Ping>()
            .accepts_all::<(Ping, Pong)>()
            .accepts_kinds([EventKind::of::<Pong>()])
            .handler(|_| {})
            .auto_unsubscribe()
            .dispatcher(Dispatcher::new("builder"))
            .build()
            .unwrap();

        assert_eq!(
            subscription.accepted_types(),
            &[EventKind::of::<Ping>(), EventKind::of::<Pong>()]
        );
        assert_eq!(subscription.policy(), UnsubscribePolicy::Auto);
    }

    #[test]
    fn test_builder_rejects_empty_types() {
        let err = Subscription::builder()
            .handler(|_| {})
            .dispatcher(Dispatcher::new("builder"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSubscription(_)));
    }

    #[test]
    fn test_builder_rejects_missing_handler() {
        let err = Subscription::builder()
            .accepts::<Ping>()
            .dispatcher(Dispatcher::new("builder"))
            .build()
            .unwrap_err();
        assert!(err.is_registration_error());
    }

    #[test]
    fn test_builder_uses_ambient_dispatcher() {
        let ambient = Dispatcher::new("ambient");
        let _scope = ambient.enter();

        let subscription = Subscription::builder()
            .accepts::<Ping>()
            .handler(|_| {})
            .build()
            .unwrap();
        assert_eq!(subscription.dispatcher(), &ambient);

        let explicit = Dispatcher::new("explicit");
        let subscription = Subscription::builder()
            .accepts::<Ping>()
            .handler(|_| {})
            .dispatcher(explicit.clone())
            .build()
            .unwrap();
        assert_eq!(subscription.dispatcher(), &explicit);
    }

    #[test]
    fn test_builder_without_any_dispatcher_fails() {
        let err = Subscription::builder()
            .accepts::<Ping>()
            .handler(|_| {})
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("dispatcher"));
    }
}
