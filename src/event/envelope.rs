//! Event envelope for type-erased event storage and delivery.

use crate::event::{Event, EventKind, EventMetadata};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Object-safe view of a published payload.
trait Payload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Event> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased, immutable published event.
///
/// The envelope captures the event's kind and full lineage at construction, so
/// matching a subscription never has to walk the hierarchy again. Cloning is
/// cheap: the payload is shared.
#[derive(Clone)]
pub struct EventEnvelope {
    /// The type-erased event payload
    payload: Arc<dyn Payload>,

    /// Kind of the concrete event type
    kind: EventKind,

    /// Type ids of the kind and every supertype, root included
    lineage: Arc<[TypeId]>,

    /// Event metadata
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Create a new envelope from an event
    pub fn new<T: Event>(event: T) -> Self {
        Self::with_metadata(event, EventMetadata::new())
    }

    /// Create a new envelope with custom metadata
    pub fn with_metadata<T: Event>(event: T, metadata: EventMetadata) -> Self {
        let kind = EventKind::of::<T>();
        let lineage = kind.lineage().iter().map(EventKind::type_id).collect();

        Self {
            payload: Arc::new(event),
            kind,
            lineage,
            metadata,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }

    /// Kind of the contained event
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Get the event ID
    pub fn event_id(&self) -> Uuid {
        self.metadata.event_id
    }

    /// Whether the contained event is exactly of type `T`
    pub fn is<T: Event>(&self) -> bool {
        self.kind.type_id() == TypeId::of::<T>()
    }

    /// Whether the contained event is `T` or a subtype of `T`
    pub fn is_instance_of<T: Event>(&self) -> bool {
        self.lineage.contains(&TypeId::of::<T>())
    }

    /// Whether the event matches any of the accepted kinds
    pub fn matches_any(&self, accepted: &[EventKind]) -> bool {
        accepted.iter().any(|k| self.lineage.contains(&k.type_id()))
    }

    /// Try to downcast to a specific event type
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("type_name", &self.kind.name())
            .field("event_id", &self.metadata.event_id)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Lifecycle;

    impl Event for Lifecycle {
        fn event_type() -> &'static str {
            "Lifecycle"
        }
    }

    #[derive(Debug, Clone)]
    struct Started {
        id: u64,
    }

    impl Event for Started {
        fn event_type() -> &'static str {
            "Started"
        }

        fn supertypes() -> Vec<EventKind> {
            vec![EventKind::of::<Lifecycle>()]
        }
    }

    #[derive(Debug)]
    struct Unrelated;

    impl Event for Unrelated {
        fn event_type() -> &'static str {
            "Unrelated"
        }
    }

    #[test]
    fn test_envelope_creation() {
        let envelope = EventEnvelope::new(Started { id: 1 });
        assert_eq!(envelope.event_type(), "Started");
        assert_eq!(envelope.kind(), EventKind::of::<Started>());
        assert!(envelope.is::<Started>());
        assert!(!envelope.is::<Lifecycle>());
        assert!(envelope.is_instance_of::<Lifecycle>());
        assert!(envelope.is_instance_of::<crate::AnyEvent>());
        assert!(!envelope.is_instance_of::<Unrelated>());
    }

    #[test]
    fn test_envelope_downcast() {
        let envelope = EventEnvelope::new(Started { id: 456 });

        assert_eq!(envelope.downcast_ref::<Started>().map(|e| e.id), Some(456));
        assert!(envelope.downcast_ref::<Lifecycle>().is_none());
    }

    #[test]
    fn test_envelope_matching() {
        let envelope = EventEnvelope::new(Started { id: 2 });

        assert!(envelope.matches_any(&[EventKind::of::<Unrelated>(), EventKind::of::<Lifecycle>()]));
        assert!(!envelope.matches_any(&[EventKind::of::<Unrelated>()]));
        assert!(!envelope.matches_any(&[]));
    }

    #[test]
    fn test_envelope_clone_shares_payload() {
        let envelope = EventEnvelope::with_metadata(Started { id: 3 }, EventMetadata::new().set_source("test"));
        let copy = envelope.clone();

        assert_eq!(copy.event_id(), envelope.event_id());
        assert!(std::ptr::eq(
            copy.downcast_ref::<Started>().unwrap(),
            envelope.downcast_ref::<Started>().unwrap()
        ));
        assert!(format!("{:?}", copy).contains("Started { id: 3 }"));
    }
}
