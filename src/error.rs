//! Error types for Tickwork
//!
//! Centralized error handling using thiserror. Task failures never show up
//! here: they are contained by the worker pool and reported as outcomes.

use std::time::Duration;

use thiserror::Error;

/// All error types that can occur in Tickwork
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Concurrency limit below one
    #[error("Invalid max workers: {0} (must be at least 1)")]
    InvalidMaxWorkers(usize),

    /// Poll interval of zero
    #[error("Invalid poll interval: {0:?} (must be non-zero)")]
    InvalidInterval(Duration),

    /// Stop requested on a scheduler that was never started
    #[error("Scheduler was never started")]
    NotStarted,

    /// Start called outside of a tokio runtime
    #[error("No tokio runtime available to host the dispatch loop")]
    NoRuntime,

    /// Configuration could not be used
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Tickwork operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
