//! Shared scheduler state.
//!
//! One [`Shared`] value is owned (behind an `Arc`) by every `Scheduler` handle
//! and by the dispatch loop. The pending store and the tunables live behind a
//! single mutex; lifecycle transitions are published on a watch channel so
//! `stop()` can wait for termination.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};

use crate::scheduler::store::{PendingStore, transplant};
use crate::scheduler::task::ScheduledTask;

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, not started.
    Idle,
    /// Dispatch loop is ticking.
    Running,
    /// Stop requested; finishing pending work.
    Draining,
    /// Dispatch loop has exited.
    Stopped,
}

impl Lifecycle {
    /// Whether the dispatch loop is alive.
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Running | Lifecycle::Draining)
    }
}

/// Counters collected across ticks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of ticks processed
    pub ticks: u64,
    /// Tasks handed to the worker pool
    pub dispatched: u64,
    /// Executions that returned normally
    pub completed: u64,
    /// Executions that panicked
    pub failed: u64,
    /// Occurrences reinserted by the recurrence policy
    pub rescheduled: u64,
    /// Submissions dropped because the scheduler was closing
    pub dropped: u64,
    /// Largest batch drained in a single tick
    pub peak_batch: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Nothing was due
    Idle,
    /// Ran this many tasks
    Dispatched(usize),
    /// Closing and nothing left; the loop should exit
    Shutdown,
}

/// State guarded by the scheduler lock.
pub(crate) struct Inner {
    pub(crate) store: Box<dyn PendingStore>,
    pub(crate) max_workers: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) closing: bool,
    pub(crate) stats: SchedulerStats,
}

/// State shared between scheduler handles and the dispatch loop.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    /// Wakes the dispatch loop on stop or reconfiguration
    pub(crate) wake: Notify,
    pub(crate) lifecycle: watch::Sender<Lifecycle>,
}

impl Shared {
    pub(crate) fn new(store: Box<dyn PendingStore>, max_workers: usize, poll_interval: Duration) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Idle);
        Self {
            inner: Mutex::new(Inner {
                store,
                max_workers,
                poll_interval,
                closing: false,
                stats: SchedulerStats::default(),
            }),
            wake: Notify::new(),
            lifecycle,
        }
    }

    /// Lock the inner state.
    ///
    /// Task bodies never run under this lock, so a poisoned guard only means
    /// our own bookkeeping panicked mid-update; the data is still usable.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Insert a task unless the scheduler is closing. Returns whether it was kept.
    pub(crate) fn insert(&self, task: ScheduledTask) -> bool {
        let mut inner = self.lock();
        if inner.closing {
            inner.stats.dropped += 1;
            tracing::debug!(due_at = %task.due_at(), "Scheduler closing, dropping task");
            return false;
        }
        inner.store.insert(task);
        true
    }

    /// Remove every task due at or before `now`, in ascending due order.
    ///
    /// Also returns the concurrency limit in effect, read under the same lock.
    pub(crate) fn drain_due(&self, now: DateTime<Utc>) -> (Vec<ScheduledTask>, usize) {
        let mut inner = self.lock();
        let mut batch = Vec::new();
        while inner.store.peek_min().is_some_and(|task| task.is_due(now)) {
            match inner.store.remove_min() {
                Some(task) => batch.push(task),
                None => break,
            }
        }
        inner.stats.ticks += 1;
        inner.stats.dispatched += batch.len() as u64;
        inner.stats.peak_batch = inner.stats.peak_batch.max(batch.len());
        (batch, inner.max_workers)
    }

    /// Swap in a new store, moving every pending task across.
    pub(crate) fn replace_store(&self, mut store: Box<dyn PendingStore>) -> usize {
        let mut inner = self.lock();
        let moved = transplant(inner.store.as_mut(), store.as_mut());
        inner.store = store;
        moved
    }

    /// Mark the scheduler closing and publish the Draining state.
    pub(crate) fn request_close(&self) {
        self.lock().closing = true;
        self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Running {
                *state = Lifecycle::Draining;
                true
            } else {
                false
            }
        });
        self.wake.notify_one();
    }

    pub(crate) fn mark_stopped(&self) {
        self.lifecycle.send_replace(Lifecycle::Stopped);
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.lock().closing
    }

    /// Whether the loop may exit: closing and nothing left pending.
    pub(crate) fn is_drained(&self) -> bool {
        let inner = self.lock();
        inner.closing && inner.store.is_empty()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.lock().poll_interval
    }
}
