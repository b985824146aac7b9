//! Scheduler handle: the public facade over the pending store, the dispatch
//! loop and the worker pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::scheduler::dispatch::DispatchLoop;
use crate::scheduler::recurrence::TaskOptions;
use crate::scheduler::state::{Lifecycle, SchedulerStats, Shared};
use crate::scheduler::store::{HeapStore, PendingStore};
use crate::scheduler::task::{ScheduledTask, Task};

/// Handle to a scheduler instance.
///
/// Cloning is cheap and every clone talks to the same instance, so task
/// bodies can hold a handle and submit follow-up work.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler with the default poll interval (30s) and
    /// concurrency limit (10).
    pub fn new() -> Self {
        let config = SchedulerConfig::default();
        Self::from_parts(config.poll_interval(), config.max_workers)
    }

    /// Create a scheduler from a validated configuration.
    pub fn with_config(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config.poll_interval(), config.max_workers))
    }

    fn from_parts(poll_interval: Duration, max_workers: usize) -> Self {
        Self {
            shared: Arc::new(Shared::new(Box::new(HeapStore::new()), max_workers, poll_interval)),
        }
    }

    /// Submit a task.
    ///
    /// Without an explicit due time the task is due immediately, even when an
    /// interval is set; the interval only spaces later firings. Once `stop()`
    /// has been requested the task is silently dropped: check
    /// [`is_closing`](Self::is_closing) if that matters.
    pub fn submit(&self, task: Task, options: TaskOptions) {
        let due_at = task.at.unwrap_or_else(Utc::now);
        let recurrence = options.build();
        tracing::debug!(%due_at, ?recurrence, "Scheduler::submit: called");
        self.shared.insert(ScheduledTask::new(due_at, task.work, recurrence));
    }

    /// Change the poll interval. Takes effect from the next tick.
    pub fn set_duration(&self, interval: Duration) -> Result<&Self> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(interval));
        }
        self.shared.lock().poll_interval = interval;
        self.shared.wake.notify_one();
        tracing::debug!(?interval, "Poll interval updated");
        Ok(self)
    }

    /// Change the concurrency limit. Applies to the next drained batch.
    pub fn set_max_worker(&self, count: usize) -> Result<&Self> {
        if count == 0 {
            return Err(SchedulerError::InvalidMaxWorkers(count));
        }
        self.shared.lock().max_workers = count;
        tracing::debug!(count, "Max workers updated");
        Ok(self)
    }

    /// Replace the pending store, moving every pending task into `store`.
    pub fn set_queue<S>(&self, store: S) -> &Self
    where
        S: PendingStore + 'static,
    {
        let moved = self.shared.replace_store(Box::new(store));
        tracing::debug!(moved, "Pending store replaced");
        self
    }

    /// Start the dispatch loop on the current tokio runtime.
    ///
    /// Only the first call spawns the loop; later calls are no-ops.
    pub fn start(&self) -> Result<&Self> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let first = self.shared.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Idle {
                *state = Lifecycle::Running;
                true
            } else {
                false
            }
        });

        if first {
            tracing::info!(
                poll_interval = ?self.poll_interval(),
                max_workers = self.max_workers(),
                "Starting scheduler"
            );
            runtime.spawn(DispatchLoop::new(self.shared.clone()).run());
        }

        Ok(self)
    }

    /// Request shutdown and wait for the dispatch loop to exit.
    ///
    /// Pending tasks keep firing as they come due until the store is empty;
    /// recurring tasks do not reschedule past this point. Returns
    /// [`SchedulerError::NotStarted`] if `start()` was never called. Calling
    /// it again after shutdown returns `Ok(())` immediately.
    ///
    /// Must not be awaited from inside a task body: the loop waits for that
    /// body to finish before it can stop.
    pub async fn stop(&self) -> Result<()> {
        let mut rx = self.shared.lifecycle.subscribe();
        match *rx.borrow_and_update() {
            Lifecycle::Idle => return Err(SchedulerError::NotStarted),
            Lifecycle::Stopped => return Ok(()),
            Lifecycle::Running | Lifecycle::Draining => {}
        }

        tracing::info!("Stopping scheduler");
        self.shared.request_close();

        // The sender lives in `shared`, which this handle keeps alive, so the
        // channel cannot close under us.
        let _ = rx.wait_for(|state| *state == Lifecycle::Stopped).await;
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    /// Whether the dispatch loop is running (including while draining).
    pub fn is_running(&self) -> bool {
        self.lifecycle().is_active()
    }

    /// Whether shutdown has been requested. Submissions are dropped from here on.
    pub fn is_closing(&self) -> bool {
        self.shared.is_closing()
    }

    /// Number of tasks waiting in the pending store.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn max_workers(&self) -> usize {
        self.shared.lock().max_workers
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval()
    }

    /// Snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats.clone()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
