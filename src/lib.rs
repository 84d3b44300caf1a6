//! # tokio-eventing
//!
//! A typed in-process event bus with thread-affine dispatchers.
//!
//! ## Features
//!
//! - **Typed events** with declared supertypes: a subscription to a supertype
//!   receives every subtype
//! - **Dispatchers** that run handlers one at a time, in FIFO order, on a
//!   dedicated worker thread or on whichever thread pumps them
//! - **Owner-keyed receivers** that can be stopped as a group
//! - **Wait futures** resolved by the first matching event or by a timeout,
//!   exactly once
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_eventing::prelude::*;
//!
//! #[derive(Debug)]
//! struct UserRegistered {
//!     email: String,
//! }
//!
//! impl Event for UserRegistered {
//!     fn event_type() -> &'static str {
//!         "UserRegistered"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dispatcher = Dispatcher::new("app");
//!     dispatcher.run()?;
//!
//!     let manager = EventManager::builder().build()?;
//!     let owner = OwnerId::named("mailer");
//!
//!     // Receive events on the dispatcher's worker thread
//!     manager.start_receiving(
//!         |event: &UserRegistered| println!("New user registered: {}", event.email),
//!         ReceiveOptions::owned_by(owner).dispatcher(dispatcher.clone()),
//!     )?;
//!
//!     // Wait for the next registration, giving up after a second
//!     let next = manager.wait_for::<UserRegistered>(
//!         WaitOptions::new()
//!             .timeout(Duration::from_secs(1))
//!             .dispatcher(dispatcher.clone()),
//!     )?;
//!
//!     manager.raise_event(UserRegistered {
//!         email: "user@example.com".to_string(),
//!     });
//!     assert!(next.await.is_some());
//!
//!     manager.stop_receiving(owner);
//!     dispatcher.complete();
//!     dispatcher.join()?;
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Core event traits, kinds and envelopes
pub mod event;

/// Error types and result aliases
pub mod error;

/// Subscription registries
pub mod registry;

/// Subscriptions, owners and handlers
pub mod subscription;

/// Thread-affine dispatchers
pub mod dispatcher;

/// The event bus
pub mod bus;

/// The event manager façade
pub mod manager;

/// Timers for wait timeouts
pub mod timer;

// Re-export commonly used types
pub use bus::{BusStats, EventBus};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherScope, DispatcherState, DispatcherStats};
pub use error::{Error, HandlerFault, Result};
pub use event::{AnyEvent, Event, EventEnvelope, EventKind, EventMetadata, EventSet};
pub use manager::{
    EventManager, EventManagerBuilder, EventManagerConfig, ReceiveOptions, WaitFor, WaitOptions,
};
pub use subscription::{Listener, OwnerId, Subscription, SubscriptionId, UnsubscribePolicy};
pub use timer::{Timer, TimerHandle, TokioTimer};

/// Prelude module for convenient imports
///
/// # Example
/// ```rust
/// use tokio_eventing::prelude::*;
/// ```
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{Error, Result};
    pub use crate::event::{Event, EventEnvelope, EventKind};
    pub use crate::manager::{EventManager, ReceiveOptions, WaitOptions};
    pub use crate::subscription::{Listener, OwnerId};
}
