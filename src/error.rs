//! Error types for the tokio-eventing library.

use thiserror::Error;
use uuid::Uuid;

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tokio-eventing.
///
/// Registration errors are returned synchronously to the caller. Failures inside
/// handlers never show up here; they go to the owning dispatcher's unhandled
/// channel as a [`HandlerFault`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Empty accepted-type set, missing handler, or no resolvable dispatcher
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// A receive registration could not determine its owner
    #[error("Cannot determine owner for {event_type} receiver; supply one explicitly")]
    AmbiguousOwner {
        /// Event type the receiver was registered for
        event_type: &'static str,
    },

    /// A subscription with the same id is already registered
    #[error("Subscription already registered: {id}")]
    DuplicateSubscription {
        /// The colliding subscription id
        id: Uuid,
    },

    /// The operation is not supported by this component
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// A dispatcher lifecycle call was made in the wrong state
    #[error("Dispatcher '{dispatcher}' cannot do that while {state}")]
    InvalidState {
        /// Dispatcher name
        dispatcher: String,
        /// Human readable state at the time of the call
        state: String,
    },

    /// The dispatcher worker terminated because of an unhandled fault
    #[error("Dispatcher '{dispatcher}' worker panicked")]
    WorkerPanicked {
        /// Dispatcher name
        dispatcher: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new invalid-subscription error
    pub fn invalid_subscription(msg: impl Into<String>) -> Self {
        Error::InvalidSubscription(msg.into())
    }

    /// Whether this error was raised while building or registering a subscription
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSubscription(_)
                | Error::AmbiguousOwner { .. }
                | Error::DuplicateSubscription { .. }
        )
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::InvalidSubscription(_) => "invalid_subscription",
            Error::AmbiguousOwner { .. } => "ambiguous_owner",
            Error::DuplicateSubscription { .. } => "duplicate_subscription",
            Error::UnsupportedOperation(_) => "unsupported_operation",
            Error::InvalidState { .. } => "invalid_state",
            Error::WorkerPanicked { .. } => "worker_panicked",
            Error::Config(_) => "config",
        }
    }
}

/// A handler panic caught by a dispatcher.
///
/// Offered to the observers registered with
/// [`Dispatcher::on_unhandled`](crate::Dispatcher::on_unhandled).
#[derive(Error, Debug, Clone)]
#[error("handler on dispatcher '{dispatcher}' panicked: {message}")]
pub struct HandlerFault {
    /// Name of the dispatcher the callback ran on
    pub dispatcher: String,
    /// Panic message, when the payload was a string
    pub message: String,
}

impl HandlerFault {
    pub(crate) fn from_panic(dispatcher: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            dispatcher: dispatcher.to_string(),
            message,
        }
    }
}
