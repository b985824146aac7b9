//! Worker pool: runs one batch of due tasks with bounded concurrency.
//!
//! The pool is not a set of long-lived workers. Each call to
//! [`WorkerPool::run_batch`] spawns one tokio task per entry, never more than
//! `max_workers` at a time, and returns once every entry has finished. A
//! panicking body surfaces as a [`TaskOutcome::Failed`] at the join boundary
//! and does not disturb its siblings.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};

use crate::scheduler::task::{ScheduledTask, Work};

/// Result of one task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Body returned normally.
    Completed,
    /// Body panicked (or was cancelled); the message is best effort.
    Failed(String),
}

impl TaskOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

/// One finished execution, handed back to the dispatch loop.
#[derive(Debug)]
pub struct Execution {
    /// The entry that ran. Its recurrence decides what happens next.
    pub task: ScheduledTask,
    pub outcome: TaskOutcome,
    /// When the body returned, or when the failure was observed.
    pub finished_at: DateTime<Utc>,
}

/// Bounded batch executor.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_workers: usize,
}

impl WorkerPool {
    /// Create a pool. A limit of zero is clamped to one.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every task in `batch` and wait for all of them.
    ///
    /// Tasks start in batch order and executions come back in the same order.
    pub async fn run_batch(&self, batch: Vec<ScheduledTask>) -> Vec<Execution> {
        if batch.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut running: Vec<(ScheduledTask, Option<JoinHandle<DateTime<Utc>>>)> = Vec::with_capacity(batch.len());

        for task in batch {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // Semaphore is local and never closed
                    tracing::error!(due_at = %task.due_at(), "Worker pool semaphore closed, task not started");
                    running.push((task, None));
                    continue;
                }
            };

            let handle = match task.work().clone() {
                Work::Blocking(f) => tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    f();
                    Utc::now()
                }),
                // The closure itself runs inside the spawned task so a panic
                // while building the future is caught at the join boundary.
                Work::Async(f) => tokio::spawn(async move {
                    let _permit = permit;
                    f().await;
                    Utc::now()
                }),
            };
            running.push((task, Some(handle)));
        }

        let mut executions = Vec::with_capacity(running.len());
        for (task, handle) in running {
            executions.push(finish(task, handle).await);
        }

        executions
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Wait for one spawned body and turn its result into an [`Execution`].
///
/// A task that never got a worker (`None`) counts as failed so its
/// recurrence still applies.
async fn finish(task: ScheduledTask, handle: Option<JoinHandle<DateTime<Utc>>>) -> Execution {
    let result = match handle {
        Some(handle) => handle.await.map_err(join_error_message),
        None => Err("task not started: worker pool closed".to_string()),
    };
    let (outcome, finished_at) = match result {
        Ok(finished_at) => (TaskOutcome::Completed, finished_at),
        Err(message) => {
            tracing::warn!(due_at = %task.due_at(), error = %message, "Scheduled task failed");
            (TaskOutcome::Failed(message), Utc::now())
        }
    };
    Execution {
        task,
        outcome,
        finished_at,
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        "task cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
