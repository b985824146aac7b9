//! Task types: what callers submit and what the pending store holds.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::scheduler::recurrence::Recurrence;

/// The callable body of a task.
///
/// Bodies are shared (`Arc`) so a recurring task can hand the same callable
/// to every occurrence without cloning captured state.
#[derive(Clone)]
pub enum Work {
    /// Synchronous closure, run on the blocking thread pool.
    Blocking(Arc<dyn Fn() + Send + Sync>),
    /// Closure producing a future, run as a tokio task.
    Async(Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>),
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Blocking(_) => f.write_str("Work::Blocking"),
            Work::Async(_) => f.write_str("Work::Async"),
        }
    }
}

/// A unit of work submitted to the scheduler.
#[derive(Debug, Clone)]
pub struct Task {
    /// Absolute due time. `None` means "now" at submission.
    pub at: Option<DateTime<Utc>>,
    /// Body to execute.
    pub work: Work,
}

impl Task {
    /// Create a task from a blocking closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            at: None,
            work: Work::Blocking(Arc::new(f)),
        }
    }

    /// Create a task from a closure returning a future.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            at: None,
            work: Work::Async(Arc::new(move || Box::pin(f()) as BoxFuture<'static, ()>)),
        }
    }

    /// Set an explicit due time.
    pub fn at(mut self, due: DateTime<Utc>) -> Self {
        self.at = Some(due);
        self
    }
}

/// A task resident in the pending store.
///
/// The due time is always set; normalization happens at submission.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    due_at: DateTime<Utc>,
    work: Work,
    recurrence: Recurrence,
}

impl ScheduledTask {
    /// Create a pending entry.
    pub fn new(due_at: DateTime<Utc>, work: Work, recurrence: Recurrence) -> Self {
        Self {
            due_at,
            work,
            recurrence,
        }
    }

    /// Absolute time at or after which the task may run.
    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    /// Whether the task is eligible to run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// The task body.
    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Recurrence state carried by this entry.
    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    /// Consume this entry and build the next occurrence, if any.
    ///
    /// `now` is the completion time of the execution that just finished.
    pub fn next_occurrence(self, now: DateTime<Utc>) -> Option<ScheduledTask> {
        let (recurrence, due_at) = self.recurrence.advance(now)?;
        Some(ScheduledTask {
            due_at,
            work: self.work,
            recurrence,
        })
    }
}
