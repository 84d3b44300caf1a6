//! Owner identity used as a removal key.

use std::fmt;
use uuid::Uuid;

/// Opaque identity token of a subscription owner.
///
/// The bus only compares owners; it never holds a reference to the owning
/// object, so registering never extends its lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId {
    id: Uuid,
    label: Option<&'static str>,
}

impl OwnerId {
    /// Create a fresh anonymous owner
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            label: None,
        }
    }

    /// Create a fresh owner with a label for logs
    pub fn named(label: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: Some(label),
        }
    }

    /// The unique id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The label, if any
    pub fn label(&self) -> Option<&'static str> {
        self.label
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.id.simple().to_string()[..8];
        match self.label {
            Some(label) => write!(f, "{}#{}", label, short),
            None => f.write_str(short),
        }
    }
}

/// An object that knows its own owner identity.
///
/// Lets [`EventManager::listen`](crate::EventManager::listen) derive the owner
/// of a registration from the listener instead of requiring one.
pub trait Listener: Send + Sync + 'static {
    /// Owner identity used for this listener's subscriptions
    fn listener_id(&self) -> OwnerId;
}
