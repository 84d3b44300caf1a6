//! Ambient dispatcher scope.
//!
//! Code that registers subscriptions without naming a dispatcher gets the one
//! entered on its thread. Entering is explicit and stack-scoped: a worker enters
//! its own dispatcher for its lifetime, [`Dispatcher::run_all_operations`] for
//! the duration of the pump, and host code via [`Dispatcher::enter`].

use super::Dispatcher;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static AMBIENT: RefCell<Vec<Dispatcher>> = const { RefCell::new(Vec::new()) };
}

/// Guard keeping a dispatcher ambient on the current thread.
///
/// Scopes nest; dropping one restores the previously entered dispatcher.
#[must_use = "the dispatcher stops being ambient when the scope is dropped"]
#[derive(Debug)]
pub struct DispatcherScope {
    // Scopes are tied to the thread that entered them.
    _not_send: PhantomData<*const ()>,
}

pub(super) fn enter(dispatcher: Dispatcher) -> DispatcherScope {
    AMBIENT.with(|stack| stack.borrow_mut().push(dispatcher));
    DispatcherScope {
        _not_send: PhantomData,
    }
}

pub(super) fn current() -> Option<Dispatcher> {
    AMBIENT
        .try_with(|stack| stack.borrow().last().cloned())
        .ok()
        .flatten()
}

impl Drop for DispatcherScope {
    fn drop(&mut self) {
        let _ = AMBIENT.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
