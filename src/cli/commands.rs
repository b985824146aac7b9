//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive a synthetic workload through a scheduler
//! - config: print the effective configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Tickwork - in-process scheduled task dispatcher
#[derive(Parser, Debug)]
#[command(name = "tickwork")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synthetic workload and report what fired
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config,
}

/// Workload shape for the `run` subcommand
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of tasks to submit
    #[arg(short = 'n', long, default_value_t = 5)]
    pub tasks: usize,

    /// Spread first due times over this many milliseconds
    #[arg(long, default_value_t = 100)]
    pub spread_ms: u64,

    /// Fire each task this many times
    #[arg(short, long)]
    pub repeat: Option<u32>,

    /// Interval between firings in milliseconds (0 = one-shot)
    #[arg(short, long, default_value_t = 0)]
    pub every_ms: u64,

    /// Make every Nth task panic (0 = never)
    #[arg(long, default_value_t = 0)]
    pub fail_every: usize,

    /// Override the poll interval in milliseconds
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Override the concurrency limit
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Let the workload run this long before stopping, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub for_ms: u64,
}

impl RunArgs {
    /// Offset of task `index` from the workload start, spreading tasks
    /// evenly over `spread_ms`.
    pub fn due_offset(&self, index: usize) -> Duration {
        if self.tasks < 2 {
            return Duration::ZERO;
        }
        let index = index.min(self.tasks - 1) as u128;
        let millis = u128::from(self.spread_ms) * index / (self.tasks as u128 - 1);
        // Never exceeds spread_ms, so it fits back into u64
        Duration::from_millis(u64::try_from(millis).unwrap_or(self.spread_ms))
    }
}
