//! Subscriptions: registered interest in event types.
//!
//! A [`Subscription`] binds a set of accepted event kinds to a handler, an
//! owner, an unsubscribe policy and the dispatcher the handler must run on.
//! It is immutable once built.

use crate::{Dispatcher, EventEnvelope, EventKind, EventSet, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

pub mod builder;
pub mod handler;
pub mod owner;

pub use builder::SubscriptionBuilder;
pub use handler::{envelope_handler, filtered_handler, typed_handler, EnvelopeFilter, Handler};
pub use owner::{Listener, OwnerId};

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.simple().to_string()[..8])
    }
}

/// When a subscription leaves the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsubscribePolicy {
    /// Stays until explicitly removed
    #[default]
    Manual,
    /// Removed right after its first match
    Auto,
}

/// A registered interest in one or more event kinds.
pub struct Subscription {
    id: SubscriptionId,
    owner: OwnerId,
    accepted: Vec<EventKind>,
    handler: Handler,
    policy: UnsubscribePolicy,
    dispatcher: Dispatcher,
    exact: bool,
    claimed: AtomicBool,
}

impl Subscription {
    /// Start building a subscription
    pub fn builder() -> SubscriptionBuilder {
        SubscriptionBuilder::new()
    }

    /// Build a subscription for the 1 to 5 event types in `S`.
    ///
    /// `dispatcher` falls back to the ambient dispatcher.
    pub fn create<S, F>(
        handler: F,
        owner: OwnerId,
        policy: UnsubscribePolicy,
        dispatcher: Option<Dispatcher>,
    ) -> Result<Self>
    where
        S: EventSet,
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let mut builder = Self::builder()
            .accepts_all::<S>()
            .handler(handler)
            .owner(owner)
            .policy(policy);
        if let Some(dispatcher) = dispatcher {
            builder = builder.dispatcher(dispatcher);
        }
        builder.build()
    }

    pub(crate) fn from_parts(
        id: SubscriptionId,
        owner: OwnerId,
        accepted: Vec<EventKind>,
        handler: Handler,
        policy: UnsubscribePolicy,
        dispatcher: Dispatcher,
        exact: bool,
    ) -> Self {
        Self {
            id,
            owner,
            accepted,
            handler,
            policy,
            dispatcher,
            exact,
            claimed: AtomicBool::new(false),
        }
    }

    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Owner identity
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Accepted event kinds
    pub fn accepted_types(&self) -> &[EventKind] {
        &self.accepted
    }

    /// Unsubscribe policy
    pub fn policy(&self) -> UnsubscribePolicy {
        self.policy
    }

    /// Dispatcher the handler runs on
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether only the accepted concrete kinds match, subtypes excluded
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Whether a published envelope matches this subscription
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        if self.exact {
            return self.accepted.contains(&envelope.kind());
        }
        envelope.matches_any(&self.accepted)
    }

    /// Whether events of `kind` would be delivered here, i.e. some accepted kind
    /// is `kind` itself or, unless exact, one of its supertypes
    pub fn accepts(&self, kind: &EventKind) -> bool {
        if self.exact {
            return self.accepted.contains(kind);
        }
        kind.lineage().iter().any(|k| self.accepted.contains(k))
    }

    /// Claim the right to deliver. Auto subscriptions grant it once.
    pub(crate) fn try_claim(&self) -> bool {
        match self.policy {
            UnsubscribePolicy::Manual => true,
            UnsubscribePolicy::Auto => !self.claimed.swap(true, Ordering::AcqRel),
        }
    }

    /// Post the handler invocation to the target dispatcher
    pub(crate) fn deliver(&self, envelope: EventEnvelope) -> bool {
        let handler = self.handler.clone();
        self.dispatcher.post(move || handler(&envelope))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("accepted", &self.accepted)
            .field("policy", &self.policy)
            .field("exact", &self.exact)
            .field("dispatcher", &self.dispatcher.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Event};

    #[derive(Debug)]
    struct Connection;

    impl Event for Connection {
        fn event_type() -> &'static str {
            "Connection"
        }
    }

    #[derive(Debug)]
    struct Connected;

    impl Event for Connected {
        fn event_type() -> &'static str {
            "Connected"
        }

        fn supertypes() -> Vec<EventKind> {
            vec![EventKind::of::<Connection>()]
        }
    }

    #[derive(Debug)]
    struct Disconnected;

    impl Event for Disconnected {
        fn event_type() -> &'static str {
            "Disconnected"
        }
    }

    #[test]
    fn test_create_with_event_set() {
        let dispatcher = Dispatcher::new("test");
        let owner = OwnerId::new();
        let subscription = Subscription::create::<(Connected, Disconnected), _>(
            |_| {},
            owner,
            UnsubscribePolicy::Auto,
            Some(dispatcher.clone()),
        )
        .unwrap();

        assert_eq!(subscription.owner(), owner);
        assert_eq!(subscription.policy(), UnsubscribePolicy::Auto);
        assert_eq!(subscription.accepted_types().len(), 2);
        assert_eq!(subscription.dispatcher(), &dispatcher);
    }

    #[test]
    fn test_create_without_dispatcher_fails() {
        let result = Subscription::create::<(Connected,), _>(
            |_| {},
            OwnerId::new(),
            UnsubscribePolicy::Manual,
            None,
        );
        assert!(matches!(result, Err(Error::InvalidSubscription(_))));
    }

    #[test]
    fn test_matching_is_polymorphic() {
        let dispatcher = Dispatcher::new("test");
        let subscription = Subscription::create::<(Connection,), _>(
            |_| {},
            OwnerId::new(),
            UnsubscribePolicy::Manual,
            Some(dispatcher),
        )
        .unwrap();

        assert!(subscription.matches(&EventEnvelope::new(Connected)));
        assert!(subscription.matches(&EventEnvelope::new(Connection)));
        assert!(!subscription.matches(&EventEnvelope::new(Disconnected)));

        assert!(subscription.accepts(&EventKind::of::<Connected>()));
        assert!(!subscription.accepts(&EventKind::of::<Disconnected>()));
    }

    #[test]
    fn test_exact_matching_excludes_subtypes() {
        let subscription = Subscription::builder()
            .accepts::<Connection>()
            .exact_kinds()
            .handler(|_| {})
            .dispatcher(Dispatcher::new("test"))
            .build()
            .unwrap();

        assert!(subscription.is_exact());
        assert!(subscription.matches(&EventEnvelope::new(Connection)));
        assert!(!subscription.matches(&EventEnvelope::new(Connected)));

        assert!(subscription.accepts(&EventKind::of::<Connection>()));
        assert!(!subscription.accepts(&EventKind::of::<Connected>()));
    }

    #[test]
    fn test_auto_claims_once() {
        let dispatcher = Dispatcher::new("test");
        let auto = Subscription::create::<(Connected,), _>(
            |_| {},
            OwnerId::new(),
            UnsubscribePolicy::Auto,
            Some(dispatcher.clone()),
        )
        .unwrap();
        let manual = Subscription::create::<(Connected,), _>(
            |_| {},
            OwnerId::new(),
            UnsubscribePolicy::Manual,
            Some(dispatcher),
        )
        .unwrap();

        assert!(auto.try_claim());
        assert!(!auto.try_claim());
        assert!(manual.try_claim());
        assert!(manual.try_claim());
    }

    #[test]
    fn test_deliver_posts_to_dispatcher() {
        let dispatcher = Dispatcher::new("test");
        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let subscription = Subscription::create::<(Connected,), _>(
            move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
            OwnerId::new(),
            UnsubscribePolicy::Manual,
            Some(dispatcher.clone()),
        )
        .unwrap();

        assert!(subscription.deliver(EventEnvelope::new(Connected)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        dispatcher.run_all_operations();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_id_display() {
        let id = SubscriptionId::new();
        assert!(id.to_string().starts_with("Sub("));
        assert_eq!(SubscriptionId::from_uuid(id.as_uuid()), id);
    }
}
