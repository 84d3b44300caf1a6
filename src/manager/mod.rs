//! The EventManager façade.
//!
//! The manager is the application-facing entry point: it raises events,
//! registers long-lived receivers and turns one-shot subscriptions into
//! awaitable [`WaitFor`] futures with optional timeouts.

use crate::subscription::{
    envelope_handler, filtered_handler, typed_handler, Handler, Listener, OwnerId, Subscription,
    SubscriptionId,
};
use crate::timer::{Timer, TokioTimer};
use crate::{Dispatcher, Error, Event, EventBus, EventEnvelope, EventKind, EventSet, Result};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

pub mod builder;
pub mod config;
pub mod options;
pub mod wait;

pub use builder::EventManagerBuilder;
pub use config::EventManagerConfig;
pub use options::{ReceiveFilter, ReceiveOptions, WaitOptions};
pub use wait::WaitFor;

use wait::{Abandon, Completion};

/// Raises events, registers receivers and waits for events.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tokio_eventing::{Dispatcher, Event, EventManager, OwnerId, ReceiveOptions, WaitOptions};
///
/// #[derive(Debug)]
/// struct Connected;
///
/// impl Event for Connected {
///     fn event_type() -> &'static str { "Connected" }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dispatcher = Dispatcher::new("app");
///     dispatcher.run()?;
///
///     let manager = EventManager::builder().build()?;
///     let owner = OwnerId::named("app");
///
///     manager.start_receiving(
///         |_: &Connected| println!("connected"),
///         ReceiveOptions::owned_by(owner).dispatcher(dispatcher.clone()),
///     )?;
///
///     let wait = manager.wait_for::<Connected>(
///         WaitOptions::new()
///             .timeout(Duration::from_secs(1))
///             .dispatcher(dispatcher.clone()),
///     )?;
///     manager.raise_event(Connected);
///
///     assert!(wait.await.is_some());
///     manager.stop_receiving(owner);
///     Ok(())
/// }
/// ```
pub struct EventManager {
    pub(crate) bus: Arc<EventBus>,
    pub(crate) timer: OnceLock<Arc<dyn Timer>>,
    pub(crate) config: EventManagerConfig,
    pub(crate) owner: OwnerId,
}

impl EventManager {
    /// Create a new EventManager builder
    pub fn builder() -> EventManagerBuilder {
        EventManagerBuilder::new()
    }

    /// The bus this manager publishes to
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Manager configuration
    pub fn config(&self) -> &EventManagerConfig {
        &self.config
    }

    /// Owner of the one-shot subscriptions created by waits
    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    /// Publish an event. Returns the number of deliveries posted.
    pub fn raise_event<T: Event>(&self, event: T) -> usize {
        info!(event_type = T::event_type(), event = ?event, "Event raised");
        self.bus.publish_event(event)
    }

    /// Publish a prepared envelope
    pub fn raise_envelope(&self, envelope: EventEnvelope) -> usize {
        info!(
            event_type = envelope.event_type(),
            event_id = %envelope.event_id(),
            "Event raised"
        );
        self.bus.publish(envelope)
    }

    /// Wait for the next event of type `T` or one of its subtypes
    pub fn wait_for<T: Event>(&self, options: WaitOptions) -> Result<WaitFor> {
        self.wait_for_kinds(vec![EventKind::of::<T>()], options)
    }

    /// Wait for the first event of any type in `S`
    pub fn wait_for_any<S: EventSet>(&self, options: WaitOptions) -> Result<WaitFor> {
        self.wait_for_kinds(S::kinds(), options)
    }

    /// Wait for the first event accepted by any of `kinds`.
    ///
    /// Backed by a one-shot subscription owned by [`owner_id`](Self::owner_id).
    /// The first match resolves the future and cancels the timeout; an expired
    /// timeout resolves it to `None` and removes the subscription. Whichever
    /// happens first wins, the other is a no-op. A delivery rejected by the
    /// filter consumes the subscription but leaves the future pending, so
    /// only the timeout can end it.
    pub fn wait_for_kinds(&self, kinds: Vec<EventKind>, options: WaitOptions) -> Result<WaitFor> {
        let timeout = options.timeout.or(self.config.default_wait_timeout);

        let (completion, receiver) = Completion::new();
        let completion = Arc::new(completion);
        let id = SubscriptionId::new();
        let names = kind_names(&kinds);

        let filter = options.filter;
        let abandon = Abandon::new(completion.clone());
        let handler = move |envelope: &EventEnvelope| {
            let resolver = abandon.delivered();
            if let Some(filter) = &filter {
                if !filter(envelope) {
                    debug!(subscription_id = %id, event_type = envelope.event_type(), "Wait filter rejected event");
                    return;
                }
            }
            if resolver.try_resolve(Some(envelope.clone())) {
                resolver.disarm();
                info!(subscription_id = %id, event_type = envelope.event_type(), "Wait ended");
            }
        };

        let mut builder = Subscription::builder()
            .id(id)
            .accepts_kinds(kinds)
            .owner(self.owner)
            .auto_unsubscribe()
            .handler(handler);
        if let Some(dispatcher) = options.dispatcher {
            builder = builder.dispatcher(dispatcher);
        }
        self.bus.subscribe(builder.build()?)?;

        if let Some(after) = timeout {
            let timer = match self.timer() {
                Ok(timer) => timer,
                Err(e) => {
                    self.bus.unsubscribe(id);
                    return Err(e);
                }
            };
            let bus = Arc::downgrade(&self.bus);
            let expiring = completion.clone();
            let handle = timer.schedule(
                after,
                Box::new(move || {
                    if expiring.try_resolve(None) {
                        if let Some(bus) = bus.upgrade() {
                            bus.unsubscribe(id);
                        }
                        info!(subscription_id = %id, "Wait ended: timeout");
                    }
                }),
            );
            completion.arm(handle);
        }

        info!(
            event_types = %names,
            subscription_id = %id,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Waiting"
        );
        Ok(WaitFor::new(id, receiver, completion))
    }

    /// Receive every event of concrete type `T` until stopped.
    ///
    /// A closure has no natural owner, so `options` must name one; it is the
    /// key for [`stop_receiving`](Self::stop_receiving). Subtypes of `T` are
    /// not delivered here since the handler takes a `&T`; use
    /// [`start_receiving_kinds`](Self::start_receiving_kinds) for those.
    pub fn start_receiving<T, F>(&self, handler: F, options: ReceiveOptions<T>) -> Result<SubscriptionId>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let owner = options.owner.ok_or(Error::AmbiguousOwner {
            event_type: T::event_type(),
        })?;

        let filter = options.filter;
        let handler = typed_handler(move |event: &T| {
            if filter.as_ref().map_or(true, |f| f(event)) {
                handler(event)
            }
        });

        self.register_receiver(
            SubscriptionId::new(),
            vec![EventKind::of::<T>()],
            true,
            handler,
            owner,
            options.dispatcher,
        )
    }

    /// Receive envelopes of any of `kinds`, subtypes included
    pub fn start_receiving_kinds<F>(
        &self,
        kinds: Vec<EventKind>,
        handler: F,
        options: ReceiveOptions<EventEnvelope>,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let Some(first) = kinds.first() else {
            return Err(Error::invalid_subscription("no event types accepted"));
        };
        let owner = options.owner.ok_or(Error::AmbiguousOwner {
            event_type: first.name(),
        })?;

        let handler = match options.filter {
            Some(filter) => filtered_handler(envelope_handler(handler), filter),
            None => envelope_handler(handler),
        };

        self.register_receiver(SubscriptionId::new(), kinds, false, handler, owner, options.dispatcher)
    }

    /// Receive events of concrete type `T` on behalf of `listener`.
    ///
    /// The owner defaults to the listener's own id. The listener is held
    /// weakly; once it is dropped the subscription removes itself on its
    /// next delivery.
    pub fn listen<T, L, F>(
        &self,
        listener: &Arc<L>,
        handler: F,
        options: ReceiveOptions<T>,
    ) -> Result<SubscriptionId>
    where
        T: Event,
        L: Listener,
        F: Fn(&L, &T) + Send + Sync + 'static,
    {
        let owner = options.owner.unwrap_or_else(|| listener.listener_id());
        let id = SubscriptionId::new();
        let target = Arc::downgrade(listener);
        let bus = Arc::downgrade(&self.bus);
        let filter = options.filter;

        let handler = typed_handler(move |event: &T| {
            let Some(listener) = target.upgrade() else {
                debug!(subscription_id = %id, "Listener dropped, removing its subscription");
                if let Some(bus) = bus.upgrade() {
                    bus.unsubscribe(id);
                }
                return;
            };
            if filter.as_ref().map_or(true, |f| f(event)) {
                handler(&listener, event)
            }
        });

        self.register_receiver(id, vec![EventKind::of::<T>()], true, handler, owner, options.dispatcher)
    }

    /// Stop every receiver and pending wait held by `owner`
    pub fn stop_receiving(&self, owner: OwnerId) -> usize {
        info!(owner = %owner, "Stop receiving: all events");
        self.bus.unsubscribe_owner(owner)
    }

    /// Stop the receivers of `owner` that accept events of type `T`
    pub fn stop_receiving_type<T: Event>(&self, owner: OwnerId) -> usize {
        info!(owner = %owner, event_type = T::event_type(), "Stop receiving");
        self.bus.unsubscribe_owner_kind(owner, EventKind::of::<T>())
    }

    /// Snapshot of the live subscriptions on the bus
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.bus.subscriptions()
    }

    fn register_receiver(
        &self,
        id: SubscriptionId,
        kinds: Vec<EventKind>,
        exact: bool,
        handler: Handler,
        owner: OwnerId,
        dispatcher: Option<Dispatcher>,
    ) -> Result<SubscriptionId> {
        let names = kind_names(&kinds);
        let mut builder = Subscription::builder()
            .id(id)
            .accepts_kinds(kinds)
            .owner(owner)
            .boxed_handler(handler);
        if exact {
            builder = builder.exact_kinds();
        }
        if let Some(dispatcher) = dispatcher {
            builder = builder.dispatcher(dispatcher);
        }

        let id = self.bus.subscribe(builder.build()?)?;
        info!(owner = %owner, event_types = %names, subscription_id = %id, "Receiving");
        Ok(id)
    }

    fn timer(&self) -> Result<Arc<dyn Timer>> {
        if let Some(timer) = self.timer.get() {
            return Ok(timer.clone());
        }

        let dedicated: Arc<dyn Timer> =
            Arc::new(TokioTimer::dedicated(self.config.timer_thread_name.clone())?);
        Ok(self.timer.get_or_init(|| dedicated).clone())
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("owner", &self.owner)
            .field("config", &self.config)
            .field("timer", &self.timer.get())
            .field("bus", &self.bus.stats())
            .finish()
    }
}

fn kind_names(kinds: &[EventKind]) -> String {
    kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(",")
}
