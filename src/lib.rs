//! Tickwork - an in-process scheduled task dispatcher
//!
//! Callers submit work tagged with a due time and an optional recurrence
//! policy. A background dispatch loop fires each task at or after its due
//! time, bounds how many run at once, and drains outstanding work on a
//! graceful stop.

pub mod config;
pub mod error;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use scheduler::{Lifecycle, PendingStore, Scheduler, SchedulerStats, Task, TaskOptions};
