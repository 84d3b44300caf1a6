//! Configuration for the event manager.

use crate::{Error, Result};
use std::time::Duration;

/// Configuration for the event manager
#[derive(Debug, Clone)]
pub struct EventManagerConfig {
    /// Timeout applied to waits that do not set their own
    pub default_wait_timeout: Option<Duration>,

    /// Thread name of the timer runtime started when no tokio runtime is ambient
    pub timer_thread_name: String,

    /// Initial capacity of the default registry
    pub registry_capacity: usize,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout: None,
            timer_thread_name: "eventing-timer".to_string(),
            registry_capacity: 64,
        }
    }
}

impl EventManagerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default wait timeout; `None` waits forever
    pub fn default_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_wait_timeout = timeout;
        self
    }

    /// Set the timer thread name
    pub fn timer_thread_name(mut self, name: impl Into<String>) -> Self {
        self.timer_thread_name = name.into();
        self
    }

    /// Set the registry capacity
    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    /// Configuration for testing
    pub fn test() -> Self {
        Self::default()
            .default_wait_timeout(Some(Duration::from_secs(5)))
            .timer_thread_name("eventing-test-timer")
            .registry_capacity(16)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timer_thread_name.trim().is_empty() {
            return Err(Error::Config("timer thread name must not be empty".into()));
        }
        if self.default_wait_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "default wait timeout must be positive, use None to wait forever".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(EventManagerConfig::default().validate().is_ok());

        let test = EventManagerConfig::test();
        assert!(test.validate().is_ok());
        assert_eq!(test.default_wait_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_invalid_values() {
        let config = EventManagerConfig::new().timer_thread_name("  ");
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = EventManagerConfig::new().default_wait_timeout(Some(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
