//! CLI module for tickwork - command-line interface and subcommands.
//!
//! Provides a demo workload runner and a config inspector.

pub mod commands;

pub use commands::Cli;
