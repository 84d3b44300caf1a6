//! Per-call options for waits and receivers.

use crate::subscription::{EnvelopeFilter, OwnerId};
use crate::{Dispatcher, EventEnvelope};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Options for [`EventManager::wait_for`](super::EventManager::wait_for).
#[derive(Clone, Default)]
pub struct WaitOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) filter: Option<EnvelopeFilter>,
    pub(crate) dispatcher: Option<Dispatcher>,
}

impl WaitOptions {
    /// No timeout, no filter, ambient dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve to `None` once `timeout` elapses without a match
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Only resolve with events accepted by `filter`.
    ///
    /// The wait holds a one-shot subscription: a rejected event still
    /// consumes it and the wait then ends only through its timeout. Without
    /// a timeout it stays pending.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&EventEnvelope) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Dispatcher the matching runs on
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout", &self.timeout)
            .field("has_filter", &self.filter.is_some())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Predicate over events of type `E`
pub type ReceiveFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Options for the `start_receiving` family on
/// [`EventManager`](super::EventManager).
pub struct ReceiveOptions<E> {
    pub(crate) owner: Option<OwnerId>,
    pub(crate) filter: Option<ReceiveFilter<E>>,
    pub(crate) dispatcher: Option<Dispatcher>,
}

impl<E> ReceiveOptions<E> {
    /// Empty options
    pub fn new() -> Self {
        Self {
            owner: None,
            filter: None,
            dispatcher: None,
        }
    }

    /// Options carrying an owner
    pub fn owned_by(owner: OwnerId) -> Self {
        Self::new().owner(owner)
    }

    /// Owner used later to stop receiving
    pub fn owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Skip events rejected by `filter`
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Dispatcher the handler runs on
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

impl<E> Default for ReceiveOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ReceiveOptions<E> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            filter: self.filter.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<E> fmt::Debug for ReceiveOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveOptions")
            .field("owner", &self.owner)
            .field("has_filter", &self.filter.is_some())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
