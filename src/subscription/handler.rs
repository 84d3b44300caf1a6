//! Event handler types and adapters.

use crate::{Event, EventEnvelope};
use std::sync::Arc;
use tracing::debug;

/// Type-erased subscription handler
pub type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Predicate over published envelopes
pub type EnvelopeFilter = Arc<dyn Fn(&EventEnvelope) -> bool + Send + Sync>;

/// Wrap a closure over envelopes as a handler
pub fn envelope_handler<F>(f: F) -> Handler
where
    F: Fn(&EventEnvelope) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Adapt a handler over a concrete event type.
///
/// Envelopes carrying any other concrete type are skipped. Pair it with an
/// exact-kind subscription so that every posted delivery reaches `f`.
pub fn typed_handler<T, F>(f: F) -> Handler
where
    T: Event,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |envelope: &EventEnvelope| match envelope.downcast_ref::<T>() {
        Some(event) => f(event),
        None => debug!(
            expected = T::event_type(),
            actual = envelope.event_type(),
            "Typed handler skipped event of another concrete type"
        ),
    })
}

/// Run `inner` only for envelopes accepted by `filter`
pub fn filtered_handler(inner: Handler, filter: EnvelopeFilter) -> Handler {
    Arc::new(move |envelope: &EventEnvelope| {
        if filter(envelope) {
            inner(envelope)
        }
    })
}
