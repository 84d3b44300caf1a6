//! One-shot timers used for wait timeouts.

use crate::{Error, Result};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Callback run when a timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks after a delay.
///
/// Callbacks run on the timer's own threads, never on a dispatcher.
pub trait Timer: Send + Sync + Debug {
    /// Run `callback` once `after` has elapsed, unless cancelled first
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Cancellation handle for a scheduled callback.
///
/// Clones share the same cancellation state.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<Arc<AbortHandle>>,
}

impl TimerHandle {
    /// A handle with no backing task; timers check [`is_cancelled`](Self::is_cancelled)
    pub fn new() -> Self {
        Self::default()
    }

    fn for_task(cancelled: Arc<AtomicBool>, task: AbortHandle) -> Self {
        Self {
            cancelled,
            task: Some(Arc::new(task)),
        }
    }

    /// Cancel the callback. Has no effect once it has started running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Timer backed by a tokio runtime.
#[derive(Debug)]
pub struct TokioTimer {
    handle: Handle,
    owned: Option<Runtime>,
}

impl TokioTimer {
    /// Use the runtime the caller is running in
    pub fn from_current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|_| Error::Config("no tokio runtime available for timers".into()))?;
        Ok(Self {
            handle,
            owned: None,
        })
    }

    /// Start a small runtime owned by this timer
    pub fn dedicated(thread_name: impl Into<String>) -> Result<Self> {
        let thread_name = thread_name.into();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(thread_name.clone())
            .enable_time()
            .build()
            .map_err(|e| Error::Config(format!("failed to start timer runtime: {e}")))?;

        debug!(thread = %thread_name, "Started dedicated timer runtime");
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(runtime),
        })
    }

    /// Ambient runtime when there is one, a dedicated runtime otherwise
    pub fn ambient_or_dedicated(thread_name: impl Into<String>) -> Result<Self> {
        match Self::from_current() {
            Ok(timer) => Ok(timer),
            Err(_) => Self::dedicated(thread_name),
        }
    }

    /// Whether this timer owns its runtime
    pub fn is_dedicated(&self) -> bool {
        self.owned.is_some()
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            if !flag.load(Ordering::Acquire) {
                callback();
            }
        });
        trace!(after_ms = after.as_millis() as u64, "Timer scheduled");
        TimerHandle::for_task(cancelled, task.abort_handle())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        // Dropping a runtime from inside another runtime panics.
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
pub(crate) use manual::ManualTimer;
