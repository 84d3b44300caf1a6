//! The wait future and its one-shot completion cell.

use crate::subscription::SubscriptionId;
use crate::timer::TimerHandle;
use crate::EventEnvelope;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;

/// Resolved exactly once, either by a matching event or by the timeout.
///
/// Taking the sender out of the cell is the compare-and-set: only the path
/// that takes it may perform its side effects.
#[derive(Debug)]
pub(crate) struct Completion {
    sender: Mutex<Option<oneshot::Sender<Option<EventEnvelope>>>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl Completion {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Option<EventEnvelope>>) {
        let (sender, receiver) = oneshot::channel();
        let completion = Self {
            sender: Mutex::new(Some(sender)),
            timer: Mutex::new(None),
        };
        (completion, receiver)
    }

    /// Resolve with `value`; `false` if already resolved
    pub(crate) fn try_resolve(&self, value: Option<EventEnvelope>) -> bool {
        let Some(sender) = self.sender.lock().take() else {
            return false;
        };
        // The waiter may have been dropped; the resolution still counts.
        let _ = sender.send(value);
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Attach the timeout timer, cancelling it at once if a match already won
    pub(crate) fn arm(&self, handle: TimerHandle) {
        *self.timer.lock() = Some(handle.clone());
        if self.is_resolved() {
            handle.cancel();
        }
    }

    pub(crate) fn disarm(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.cancel();
        }
    }
}

/// Held by the wait's handler; resolves the wait to `None` when the handler
/// is dropped without ever having run.
///
/// That happens when the subscription is removed by `stop_receiving` or when
/// its delivery is dropped by a closed dispatcher. Once the handler has run
/// the wait is left alone, so a filter rejection keeps it pending.
#[derive(Debug)]
pub(crate) struct Abandon {
    completion: Arc<Completion>,
    delivered: AtomicBool,
}

impl Abandon {
    pub(crate) fn new(completion: Arc<Completion>) -> Self {
        Self {
            completion,
            delivered: AtomicBool::new(false),
        }
    }

    /// Record that the handler ran and hand out the completion
    pub(crate) fn delivered(&self) -> &Completion {
        self.delivered.store(true, Ordering::Release);
        &self.completion
    }
}

impl Drop for Abandon {
    fn drop(&mut self) {
        if !self.delivered.load(Ordering::Acquire) && self.completion.try_resolve(None) {
            self.completion.disarm();
            trace!("Wait abandoned before delivery");
        }
    }
}

/// Future returned by the `wait_for` family.
///
/// Resolves to the first matching envelope, or to `None` when the wait timed
/// out or was abandoned before any delivery (its subscription was stopped or
/// its dispatcher closed).
#[derive(Debug)]
#[must_use = "a wait does nothing unless awaited or waited on"]
pub struct WaitFor {
    id: SubscriptionId,
    receiver: oneshot::Receiver<Option<EventEnvelope>>,
    // Keeps the sender alive; only explicit resolution ends the wait.
    completion: Arc<Completion>,
}

impl WaitFor {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: oneshot::Receiver<Option<EventEnvelope>>,
        completion: Arc<Completion>,
    ) -> Self {
        Self {
            id,
            receiver,
            completion,
        }
    }

    /// Id of the one-shot subscription backing this wait
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether a match or the timeout has already decided the outcome
    pub fn is_resolved(&self) -> bool {
        self.completion.is_resolved()
    }

    /// Block the current thread until the wait resolves.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> Option<EventEnvelope> {
        self.receiver.blocking_recv().ok().flatten()
    }
}

impl Future for WaitFor {
    type Output = Option<EventEnvelope>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}
