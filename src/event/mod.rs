//! Core event system traits and types.
//!
//! This module defines the `Event` trait, the runtime [`EventKind`] descriptor
//! used for polymorphic matching, and the type-erased [`EventEnvelope`].
//!
//! Rust has no inheritance, so the event hierarchy is nominal and declared: an
//! event type lists the kinds it is a subtype of in [`Event::supertypes`]. A
//! subscription accepting kind `B` matches any event whose lineage contains `B`.
//! Every event implicitly belongs to [`AnyEvent`].

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

pub mod envelope;
pub mod metadata;

pub use envelope::EventEnvelope;
pub use metadata::EventMetadata;

/// Core trait that all events must implement.
///
/// Marker types that only act as a common supertype implement it as well.
///
/// # Example
///
/// ```rust
/// use tokio_eventing::{Event, EventKind};
///
/// #[derive(Debug)]
/// struct ConnectionEvent;
///
/// impl Event for ConnectionEvent {
///     fn event_type() -> &'static str {
///         "ConnectionEvent"
///     }
/// }
///
/// #[derive(Debug, Clone)]
/// struct Connected {
///     address: String,
/// }
///
/// impl Event for Connected {
///     fn event_type() -> &'static str {
///         "Connected"
///     }
///
///     fn supertypes() -> Vec<EventKind> {
///         vec![EventKind::of::<ConnectionEvent>()]
///     }
/// }
///
/// assert!(EventKind::of::<Connected>().is_subtype_of(&EventKind::of::<ConnectionEvent>()));
/// ```
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns the type name of this event.
    ///
    /// Used for logging; it should be stable and unique.
    fn event_type() -> &'static str;

    /// Direct supertypes of this event type.
    fn supertypes() -> Vec<EventKind> {
        Vec::new()
    }

    /// Get the runtime kind descriptor for this event type.
    fn kind() -> EventKind
    where
        Self: Sized,
    {
        EventKind::of::<Self>()
    }
}

/// The root of every event lineage.
///
/// Waiting for or receiving `AnyEvent` matches every published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnyEvent;

impl Event for AnyEvent {
    fn event_type() -> &'static str {
        "AnyEvent"
    }
}

/// Runtime descriptor of an event type.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
    supertypes: fn() -> Vec<EventKind>,
}

impl EventKind {
    /// Kind of the event type `T`
    pub fn of<T: Event>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::event_type(),
            supertypes: T::supertypes,
        }
    }

    /// Kind of the root [`AnyEvent`]
    pub fn any() -> Self {
        Self::of::<AnyEvent>()
    }

    /// The type id
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The event type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct supertypes as declared by the event type
    pub fn supertypes(&self) -> Vec<EventKind> {
        (self.supertypes)()
    }

    /// This kind, all transitive supertypes, and [`AnyEvent`], without duplicates.
    ///
    /// Breadth-first, so the kind itself comes first.
    pub fn lineage(&self) -> Vec<EventKind> {
        let mut seen = HashSet::new();
        let mut lineage = Vec::new();
        let mut queue = std::collections::VecDeque::from([*self]);

        while let Some(kind) = queue.pop_front() {
            if !seen.insert(kind.id) {
                continue;
            }
            queue.extend(kind.supertypes());
            lineage.push(kind);
        }

        let root = Self::any();
        if seen.insert(root.id) {
            lineage.push(root);
        }
        lineage
    }

    /// Whether this kind equals `other` or is a (transitive) subtype of it
    pub fn is_subtype_of(&self, other: &EventKind) -> bool {
        self.lineage().iter().any(|k| k.id == other.id)
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKind").field(&self.name).finish()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A fixed set of 1 to 5 event types, written as a tuple.
///
/// ```rust
/// # use tokio_eventing::{Event, EventSet};
/// # #[derive(Debug)] struct Connected;
/// # impl Event for Connected { fn event_type() -> &'static str { "Connected" } }
/// # #[derive(Debug)] struct Cancelled;
/// # impl Event for Cancelled { fn event_type() -> &'static str { "Cancelled" } }
/// let kinds = <(Connected, Cancelled)>::kinds();
/// assert_eq!(kinds.len(), 2);
/// ```
pub trait EventSet {
    /// Kinds in declaration order
    fn kinds() -> Vec<EventKind>;
}

macro_rules! impl_event_set {
    ($($t:ident),+) => {
        impl<$($t: Event),+> EventSet for ($($t,)+) {
            fn kinds() -> Vec<EventKind> {
                vec![$(EventKind::of::<$t>()),+]
            }
        }
    };
}

impl_event_set!(A);
impl_event_set!(A, B);
impl_event_set!(A, B, C);
impl_event_set!(A, B, C, D);
impl_event_set!(A, B, C, D, E);
