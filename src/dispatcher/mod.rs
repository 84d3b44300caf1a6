//! Thread-affine dispatchers.
//!
//! A [`Dispatcher`] owns a FIFO queue of callbacks and executes them one at a
//! time, either on its own dedicated worker thread ([`Dispatcher::run`]) or on
//! the calling thread when pumped with [`Dispatcher::run_all_operations`].
//! Subscriptions deliver events by posting handler invocations to the
//! dispatcher they are bound to.

use crate::error::HandlerFault;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

pub mod context;
mod worker;

pub use context::DispatcherScope;

/// A queued callback
pub(crate) type Operation = Box<dyn FnOnce() + Send + 'static>;

type UnhandledObserver = Arc<dyn Fn(&HandlerFault) -> bool + Send + Sync>;

/// Lifecycle of a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting posts, no worker started
    Created,
    /// Worker thread is executing callbacks
    Running,
    /// Closed for new posts, worker is draining the queue
    Draining,
    /// Closed for new posts, worker (if any) has exited
    Completed,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatcherState::Created => "created",
            DispatcherState::Running => "running",
            DispatcherState::Draining => "draining",
            DispatcherState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Configuration for dispatchers
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Dispatcher name, also used as the worker thread name
    pub name: String,

    /// Worker thread stack size, platform default when `None`
    pub stack_size: Option<usize>,
}

impl DispatcherConfig {
    /// Create a new dispatcher configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    /// Set the worker thread stack size
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new("dispatcher")
    }
}

/// Statistics for a dispatcher
#[derive(Debug, Clone, Default)]
pub struct DispatcherStats {
    /// Callbacks executed to completion
    pub executed: u64,

    /// Posts dropped because the dispatcher was closed
    pub dropped: u64,

    /// Callbacks that panicked
    pub faults: u64,

    /// Callbacks currently queued
    pub pending: usize,
}

struct Inner {
    id: Uuid,
    config: DispatcherConfig,
    sender: Mutex<Option<mpsc::UnboundedSender<Operation>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Operation>>>,
    state: Mutex<DispatcherState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    observers: RwLock<Vec<UnhandledObserver>>,
    executed: AtomicU64,
    dropped: AtomicU64,
    faults: AtomicU64,
    pending: AtomicUsize,
}

/// A single-threaded execution context.
///
/// Cloning yields another handle to the same dispatcher.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tokio_eventing::Dispatcher;
///
/// let dispatcher = Dispatcher::new("example");
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// let c = counter.clone();
/// dispatcher.post(move || {
///     c.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert!(dispatcher.run_all_operations());
/// assert_eq!(counter.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a new dispatcher with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(DispatcherConfig::new(name))
    }

    /// Create a new dispatcher from a configuration
    pub fn with_config(config: DispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                config,
                sender: Mutex::new(Some(sender)),
                receiver: Mutex::new(Some(receiver)),
                state: Mutex::new(DispatcherState::Created),
                worker: Mutex::new(None),
                observers: RwLock::new(Vec::new()),
                executed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                faults: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// The dispatcher entered on the current thread, if any
    pub fn current() -> Option<Dispatcher> {
        context::current()
    }

    /// Make this dispatcher the ambient one on the current thread until the
    /// returned scope is dropped.
    pub fn enter(&self) -> DispatcherScope {
        context::enter(self.clone())
    }

    /// Unique id of this dispatcher
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Name of this dispatcher
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> DispatcherState {
        *self.inner.state.lock()
    }

    /// Enqueue a callback for later execution.
    ///
    /// Never blocks. Returns `false` when the dispatcher no longer accepts work,
    /// in which case the callback is dropped without running.
    pub fn post<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let sender = self.inner.sender.lock();
            if let Some(tx) = sender.as_ref() {
                self.inner.pending.fetch_add(1, Ordering::Relaxed);
                if tx.send(Box::new(callback)).is_ok() {
                    return true;
                }
                self.inner.pending.fetch_sub(1, Ordering::Relaxed);
            }
        }

        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        trace!(dispatcher = %self.name(), "Dropping post to closed dispatcher");
        false
    }

    /// Synchronous dispatch is not supported; all delivery goes through [`post`](Self::post).
    pub fn send<F>(&self, _callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        Err(Error::UnsupportedOperation(
            "synchronous send is not supported, use post",
        ))
    }

    /// Start the dedicated worker thread.
    ///
    /// The worker enters this dispatcher as the ambient one and executes
    /// callbacks in FIFO order until the queue is completed and drained.
    pub fn run(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if *state != DispatcherState::Created {
            return Err(self.invalid_state(*state));
        }

        let receiver = self
            .inner
            .receiver
            .lock()
            .take()
            .ok_or_else(|| Error::InvalidState {
                dispatcher: self.name().to_string(),
                state: "being pumped".to_string(),
            })?;

        let handle = worker::spawn(self.clone(), receiver)?;
        *self.inner.worker.lock() = Some(handle);
        *state = DispatcherState::Running;

        debug!(dispatcher = %self.name(), "Dispatcher worker started");
        Ok(())
    }

    /// Drain the queue on the calling thread.
    ///
    /// Executes callbacks until the queue is observed empty, including callbacks
    /// posted while draining. Returns whether anything was executed. Returns
    /// `false` without running anything when a worker owns the queue or the
    /// dispatcher is already being pumped further up the stack.
    pub fn run_all_operations(&self) -> bool {
        let Some(receiver) = self.inner.receiver.lock().take() else {
            trace!(dispatcher = %self.name(), "Queue is owned elsewhere, nothing pumped");
            return false;
        };

        let mut pump = worker::Pump::new(&self.inner.receiver, receiver);
        let _scope = self.enter();

        let mut executed = false;
        while let Some(operation) = pump.try_next() {
            executed = true;
            self.execute(operation);
        }
        executed
    }

    /// Close the queue for new posts.
    ///
    /// A running worker finishes the queued callbacks and exits. Without a
    /// worker the dispatcher is completed right away; already queued callbacks
    /// can still be pumped.
    pub fn complete(&self) {
        let mut sender = self.inner.sender.lock();
        let Some(tx) = sender.take() else {
            return;
        };

        {
            let mut state = self.inner.state.lock();
            *state = match *state {
                DispatcherState::Running => DispatcherState::Draining,
                _ => DispatcherState::Completed,
            };
        }
        drop(tx);

        debug!(dispatcher = %self.name(), "Dispatcher completed for new posts");
    }

    /// Wait for the worker thread to exit.
    ///
    /// Returns immediately when no worker was started.
    pub fn join(&self) -> Result<()> {
        let Some(handle) = self.inner.worker.lock().take() else {
            return Ok(());
        };

        if handle.thread().id() == thread::current().id() {
            *self.inner.worker.lock() = Some(handle);
            return Err(Error::InvalidState {
                dispatcher: self.name().to_string(),
                state: "joining from its own worker".to_string(),
            });
        }

        handle.join().map_err(|_| Error::WorkerPanicked {
            dispatcher: self.name().to_string(),
        })
    }

    /// Register an observer for panicking callbacks.
    ///
    /// The observer returns `true` to mark the fault as handled, letting the
    /// dispatcher carry on. When no observer handles a fault, the panic resumes
    /// and terminates the worker.
    pub fn on_unhandled<F>(&self, observer: F)
    where
        F: Fn(&HandlerFault) -> bool + Send + Sync + 'static,
    {
        self.inner.observers.write().push(Arc::new(observer));
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            executed: self.inner.executed.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            faults: self.inner.faults.load(Ordering::Relaxed),
            pending: self.inner.pending.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn execute(&self, operation: Operation) {
        self.inner.pending.fetch_sub(1, Ordering::Relaxed);

        match panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(()) => {
                self.inner.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.inner.faults.fetch_add(1, Ordering::Relaxed);
                let fault = HandlerFault::from_panic(self.name(), payload.as_ref());

                if self.offer_unhandled(&fault) {
                    warn!(dispatcher = %self.name(), error = %fault.message, "Handler fault observed");
                } else {
                    error!(dispatcher = %self.name(), error = %fault.message, "Unhandled handler fault");
                    panic::resume_unwind(payload);
                }
            }
        }
    }

    fn offer_unhandled(&self, fault: &HandlerFault) -> bool {
        let observers = self.inner.observers.read().clone();
        observers
            .iter()
            .map(|observer| observer(fault))
            .fold(false, |handled, accepted| handled || accepted)
    }

    /// Called by the worker on exit, normal or not
    fn finish(&self) {
        let mut sender = self.inner.sender.lock();
        let tx = sender.take();
        *self.inner.state.lock() = DispatcherState::Completed;
        drop(tx);
    }

    fn invalid_state(&self, state: DispatcherState) -> Error {
        Error::InvalidState {
            dispatcher: self.name().to_string(),
            state: state.to_string(),
        }
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Dispatcher {}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name())
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}
