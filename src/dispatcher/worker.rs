//! Worker thread and manual pumping for a dispatcher queue.

use super::{Dispatcher, Operation};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Spawn the dedicated worker thread for `dispatcher`
pub(super) fn spawn(
    dispatcher: Dispatcher,
    receiver: mpsc::UnboundedReceiver<Operation>,
) -> Result<JoinHandle<()>> {
    let name = dispatcher.name().to_string();
    let mut builder = thread::Builder::new().name(name.clone());
    if let Some(size) = dispatcher.inner.config.stack_size {
        builder = builder.stack_size(size);
    }

    builder
        .spawn(move || process_operations(dispatcher, receiver))
        .map_err(|e| Error::Config(format!("failed to spawn worker '{}': {}", name, e)))
}

fn process_operations(dispatcher: Dispatcher, mut receiver: mpsc::UnboundedReceiver<Operation>) {
    let _exit = WorkerExit {
        dispatcher: dispatcher.clone(),
    };
    let _scope = dispatcher.enter();

    debug!(dispatcher = %dispatcher.name(), "Dispatcher worker running");

    // Ends once the sender is dropped by `complete` and the queue is empty.
    while let Some(operation) = receiver.blocking_recv() {
        dispatcher.execute(operation);
    }

    debug!(dispatcher = %dispatcher.name(), "Dispatcher worker stopped");
}

/// Closes the dispatcher when the worker exits, including by panic
struct WorkerExit {
    dispatcher: Dispatcher,
}

impl Drop for WorkerExit {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(dispatcher = %self.dispatcher.name(), "Dispatcher worker terminated by unhandled fault");
        }
        self.dispatcher.finish();
    }
}

/// Borrowed queue receiver, put back into its slot on drop.
///
/// Taking the receiver out of the slot for the duration of a pump makes
/// re-entrant pumping and pumping under a running worker observable no-ops.
pub(super) struct Pump<'a> {
    slot: &'a Mutex<Option<mpsc::UnboundedReceiver<Operation>>>,
    receiver: Option<mpsc::UnboundedReceiver<Operation>>,
}

impl<'a> Pump<'a> {
    pub(super) fn new(
        slot: &'a Mutex<Option<mpsc::UnboundedReceiver<Operation>>>,
        receiver: mpsc::UnboundedReceiver<Operation>,
    ) -> Self {
        Self {
            slot,
            receiver: Some(receiver),
        }
    }

    /// Next queued operation, `None` once the queue is observed empty
    pub(super) fn try_next(&mut self) -> Option<Operation> {
        self.receiver.as_mut()?.try_recv().ok()
    }
}

impl Drop for Pump<'_> {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *self.slot.lock() = Some(receiver);
        }
    }
}
