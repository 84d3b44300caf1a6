//! Builder pattern for constructing EventManager instances.

use super::{EventManager, EventManagerConfig};
use crate::registry::{EventRegistry, OrderedRegistry};
use crate::subscription::OwnerId;
use crate::timer::{Timer, TokioTimer};
use crate::{Error, EventBus, Result};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Builder for creating EventManager instances
pub struct EventManagerBuilder {
    config: EventManagerConfig,
    registry: Option<Arc<dyn EventRegistry>>,
    bus: Option<Arc<EventBus>>,
    timer: Option<Arc<dyn Timer>>,
}

impl EventManagerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EventManagerConfig::default(),
            registry: None,
            bus: None,
            timer: None,
        }
    }

    /// Use a custom configuration
    pub fn config(mut self, config: EventManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure the event manager
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EventManagerConfig) -> EventManagerConfig,
    {
        self.config = f(self.config);
        self
    }

    /// Use a custom registry implementation for a new bus
    pub fn registry(mut self, registry: Arc<dyn EventRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing bus with other managers
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Use a custom timer for wait timeouts
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Build the EventManager.
    ///
    /// Without an explicit timer, the ambient tokio runtime is used when there
    /// is one; otherwise a dedicated timer runtime starts on the first wait
    /// that needs a timeout.
    pub fn build(self) -> Result<EventManager> {
        self.config.validate()?;

        let bus = match (self.bus, self.registry) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "a shared bus and a custom registry are mutually exclusive".into(),
                ))
            }
            (Some(bus), None) => bus,
            (None, Some(registry)) => Arc::new(EventBus::with_registry(registry)),
            (None, None) => {
                debug!(capacity = self.config.registry_capacity, "Creating default OrderedRegistry");
                Arc::new(EventBus::with_registry(Arc::new(OrderedRegistry::with_capacity(
                    self.config.registry_capacity,
                ))))
            }
        };

        let timer = OnceLock::new();
        if let Some(custom) = self.timer {
            debug!("Using custom timer");
            let _ = timer.set(custom);
        } else if let Ok(ambient) = TokioTimer::from_current() {
            debug!("Using ambient tokio runtime for timers");
            let _ = timer.set(Arc::new(ambient) as Arc<dyn Timer>);
        }

        let manager = EventManager {
            bus,
            timer,
            config: self.config,
            owner: OwnerId::named("event-manager"),
        };

        info!(owner = %manager.owner, "EventManager built");
        Ok(manager)
    }
}

impl Default for EventManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManagerBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("bus", &self.bus.is_some())
            .field("timer", &self.timer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimer;

    #[test]
    fn test_builder_default() {
        let manager = EventManagerBuilder::new().build().unwrap();
        assert!(manager.subscriptions().is_empty());
        assert!(manager.config().default_wait_timeout.is_none());
    }

    #[test]
    fn test_builder_shared_bus() {
        let bus = Arc::new(EventBus::new());
        let first = EventManager::builder().bus(bus.clone()).build().unwrap();
        let second = EventManager::builder().bus(bus.clone()).build().unwrap();

        assert!(Arc::ptr_eq(first.bus(), second.bus()));
        assert_ne!(first.owner_id(), second.owner_id());
    }

    #[test]
    fn test_builder_rejects_bus_and_registry() {
        let err = EventManager::builder()
            .bus(Arc::new(EventBus::new()))
            .registry(Arc::new(OrderedRegistry::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_configurations() {
        let manager = EventManager::builder()
            .config(EventManagerConfig::test())
            .timer(ManualTimer::new())
            .build()
            .unwrap();
        assert!(manager.config().default_wait_timeout.is_some());

        let err = EventManager::builder()
            .configure(|c| c.timer_thread_name(""))
            .build()
            .unwrap_err();
        assert_eq!(err.as_label(), "config");
    }
}
