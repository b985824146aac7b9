//! Scheduler module for time-based task dispatch.
//!
//! This module provides:
//! - **Pending store**: a time-ordered min-heap of tasks waiting to come due,
//!   behind the swappable [`PendingStore`] trait.
//! - **Recurrence**: repeat counts, intervals and expiry via [`TaskOptions`].
//! - **Worker pool**: bounded-concurrency execution of one batch, with panics
//!   contained per task.
//! - **Scheduler**: the handle tying it together (submit, configure, start, stop).
//!
//! # Architecture
//!
//! The scheduler uses a polling model:
//! 1. `submit` inserts into the pending store under the scheduler lock
//! 2. Every poll interval the dispatch loop drains all due tasks
//! 3. The batch runs on the worker pool; the loop waits for it to finish
//! 4. Recurring tasks are reinserted with their next due time
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tickwork::scheduler::{Scheduler, Task, TaskOptions};
//!
//! # async fn demo() -> tickwork::Result<()> {
//! let scheduler = Scheduler::new();
//! scheduler.set_duration(Duration::from_millis(100))?.set_max_worker(4)?.start()?;
//!
//! scheduler.submit(
//!     Task::new(|| println!("tick")),
//!     TaskOptions::new().repeat(3).every(Duration::from_secs(1)),
//! );
//!
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod handle;
mod pool;
mod recurrence;
mod state;
mod store;
mod task;

pub use handle::Scheduler;
pub use pool::{Execution, TaskOutcome, WorkerPool};
pub use recurrence::{Recurrence, Repeat, TaskOptions};
pub use state::{Lifecycle, SchedulerStats, TickResult};
pub use store::{HeapStore, PendingStore, transplant};
pub use task::{ScheduledTask, Task, Work};
