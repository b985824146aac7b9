//! Dispatch loop.
//!
//! A single background tokio task that wakes every poll interval, drains all
//! due tasks from the pending store, runs them through the worker pool, and
//! feeds recurring tasks back into the store. Batching per tick bounds
//! wake-ups to one per interval, so a task fires up to one interval late.

use std::sync::Arc;

use chrono::Utc;

use crate::scheduler::pool::{Execution, TaskOutcome, WorkerPool};
use crate::scheduler::state::{Shared, TickResult};

/// The background actor driving the scheduler.
pub(crate) struct DispatchLoop {
    shared: Arc<Shared>,
}

impl DispatchLoop {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Run until a stop request has been observed and the store is empty.
    ///
    /// `Stopped` is published however the loop ends, so `stop()` never waits
    /// on a loop that has died.
    pub(crate) async fn run(self) {
        let _stopped = StoppedOnExit(self.shared.clone());
        tracing::info!("Dispatch loop started");
        let mut seen_closing = false;

        loop {
            let interval = self.shared.poll_interval();
            let should_tick = tokio::select! {
                _ = tokio::time::sleep(interval) => true,
                _ = self.shared.wake.notified() => {
                    // Tick right away on a fresh stop request; a
                    // reconfiguration only re-arms the timer.
                    let closing = self.shared.is_closing();
                    let fresh = closing && !seen_closing;
                    seen_closing |= closing;
                    fresh
                }
            };

            if !should_tick {
                continue;
            }

            if self.tick().await == TickResult::Shutdown {
                break;
            }
        }

        tracing::info!("Dispatch loop stopped");
    }

    /// Perform one drain-and-dispatch cycle.
    pub(crate) async fn tick(&self) -> TickResult {
        let now = Utc::now();
        let (batch, max_workers) = self.shared.drain_due(now);
        let dispatched = batch.len();

        if dispatched > 0 {
            tracing::debug!(count = dispatched, max_workers, "Dispatching due tasks");
            let executions = WorkerPool::new(max_workers).run_batch(batch).await;
            self.post_process(executions);
        }

        if self.shared.is_drained() {
            TickResult::Shutdown
        } else if dispatched > 0 {
            TickResult::Dispatched(dispatched)
        } else {
            TickResult::Idle
        }
    }

    /// Record outcomes and reinsert the next occurrence of recurring tasks.
    fn post_process(&self, executions: Vec<Execution>) {
        for execution in executions {
            {
                let mut inner = self.shared.lock();
                match execution.outcome {
                    TaskOutcome::Completed => inner.stats.completed += 1,
                    TaskOutcome::Failed(_) => inner.stats.failed += 1,
                }
            }

            // Failure and recurrence are independent
            if let Some(next) = execution.task.next_occurrence(execution.finished_at) {
                let due_at = next.due_at();
                if self.shared.insert(next) {
                    self.shared.lock().stats.rescheduled += 1;
                    tracing::debug!(%due_at, "Rescheduled recurring task");
                }
            }
        }
    }
}

/// Publishes `Stopped` when the dispatch loop future is dropped, including
/// on unwind.
struct StoppedOnExit(Arc<Shared>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("Dispatch loop panicked, scheduler stopped");
        }
        self.0.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::recurrence::{Recurrence, TaskOptions};
    use crate::scheduler::state::Lifecycle;
    use crate::scheduler::store::HeapStore;
    use crate::scheduler::task::{ScheduledTask, Task};
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(Box::new(HeapStore::new()), 4, Duration::from_millis(1)))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Task::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_tick_idle_when_nothing_due() {
        let shared = shared();
        let later = Utc::now() + ChronoDuration::seconds(60);
        shared.insert(ScheduledTask::new(later, Task::new(|| {}).work, Recurrence::once()));

        let result = DispatchLoop::new(shared.clone()).tick().await;

        assert_eq!(result, TickResult::Idle);
        assert_eq!(shared.lock().store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_runs_due_tasks() {
        let shared = shared();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        for _ in 0..3 {
            shared.insert(ScheduledTask::new(now, counting(&counter).work, Recurrence::once()));
        }

        let result = DispatchLoop::new(shared.clone()).tick().await;

        assert_eq!(result, TickResult::Dispatched(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(shared.lock().stats.completed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tick_reschedules_recurring_task() {
        let shared = shared();
        let counter = Arc::new(AtomicUsize::new(0));
        let recurrence = TaskOptions::new().repeat(2).every(Duration::from_secs(60)).build();
        shared.insert(ScheduledTask::new(Utc::now(), counting(&counter).work, recurrence));

        let dispatch = DispatchLoop::new(shared.clone());
        assert_eq!(dispatch.tick().await, TickResult::Dispatched(1));

        let inner = shared.lock();
        assert_eq!(inner.store.len(), 1);
        assert_eq!(inner.stats.rescheduled, 1);
        assert!(inner.store.peek_min().is_some_and(|t| t.due_at() > Utc::now()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_task_still_reschedules() {
        let shared = shared();
        let recurrence = TaskOptions::new().repeat(3).every(Duration::from_secs(60)).build();
        shared.insert(ScheduledTask::new(
            Utc::now(),
            Task::new(|| panic!("always fails")).work,
            recurrence,
        ));

        DispatchLoop::new(shared.clone()).tick().await;

        let inner = shared.lock();
        assert_eq!(inner.stats.failed, 1);
        assert_eq!(inner.stats.rescheduled, 1);
        assert_eq!(inner.store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recurrence_dropped_while_closing() {
        let shared = shared();
        let recurrence = TaskOptions::new().every(Duration::from_millis(1)).build();
        shared.insert(ScheduledTask::new(Utc::now(), Task::new(|| {}).work, recurrence));
        shared.request_close();

        let result = DispatchLoop::new(shared.clone()).tick().await;

        assert_eq!(result, TickResult::Shutdown);
        let inner = shared.lock();
        assert_eq!(inner.stats.dropped, 1);
        assert_eq!(inner.stats.rescheduled, 0);
    }

    #[tokio::test]
    async fn test_tick_not_shutdown_while_pending() {
        let shared = shared();
        let later = Utc::now() + ChronoDuration::seconds(60);
        shared.insert(ScheduledTask::new(later, Task::new(|| {}).work, Recurrence::once()));
        shared.request_close();

        let result = DispatchLoop::new(shared.clone()).tick().await;

        assert_eq!(result, TickResult::Idle);
    }

    #[tokio::test]
    async fn test_run_exits_after_close_and_marks_stopped() {
        let shared = shared();
        shared.lifecycle.send_replace(Lifecycle::Running);
        let handle = tokio::spawn(DispatchLoop::new(shared.clone()).run());

        shared.request_close();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should exit")
            .expect("loop should not panic");

        assert_eq!(shared.lifecycle(), Lifecycle::Stopped);
    }

    #[tokio::test]
    async fn test_loop_panic_still_marks_stopped() {
        let shared = shared();
        shared.lifecycle.send_replace(Lifecycle::Running);

        let guarded = shared.clone();
        let handle = tokio::spawn(async move {
            let _stopped = StoppedOnExit(guarded);
            panic!("dispatch loop died");
        });

        assert!(handle.await.is_err());
        assert_eq!(shared.lifecycle(), Lifecycle::Stopped);
    }
}
