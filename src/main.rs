use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use tickwork::{Scheduler, SchedulerConfig, Task, TaskOptions};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickwork")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tickwork.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: SchedulerConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => {
            // Default: a small demo workload
            let args = RunArgs {
                tasks: 5,
                spread_ms: 100,
                repeat: None,
                every_ms: 0,
                fail_every: 0,
                poll_ms: None,
                workers: None,
                for_ms: 1000,
            };
            handle_run_command(&args, config, cli.is_verbose()).await
        }
        Some(Commands::Run(args)) => handle_run_command(args, config, cli.is_verbose()).await,
        Some(Commands::Config) => handle_config_command(&config),
    }
}

async fn handle_run_command(args: &RunArgs, mut config: SchedulerConfig, verbose: bool) -> Result<()> {
    if let Some(poll_ms) = args.poll_ms {
        config.poll_interval_ms = poll_ms;
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    info!("Running workload {:?} with config {:?}", args, config);

    let scheduler = Scheduler::with_config(&config).context("Invalid scheduler configuration")?;
    scheduler.start().context("Failed to start scheduler")?;

    println!(
        "{} {} task(s), poll every {:?}, {} worker(s)",
        "Submitting:".green(),
        args.tasks,
        scheduler.poll_interval(),
        scheduler.max_workers()
    );

    let fired = Arc::new(AtomicUsize::new(0));
    let start = chrono::Utc::now();
    for i in 0..args.tasks {
        let offset = chrono::Duration::from_std(args.due_offset(i))
            .map_err(|_| eyre!("--spread-ms {} is too large", args.spread_ms))?;
        let due = start
            .checked_add_signed(offset)
            .ok_or_else(|| eyre!("--spread-ms {} is too large", args.spread_ms))?;
        let fails = args.fail_every > 0 && (i + 1) % args.fail_every == 0;
        let fired = fired.clone();

        let task = Task::new(move || {
            fired.fetch_add(1, Ordering::SeqCst);
            let late = chrono::Utc::now() - due;
            if verbose {
                println!("  task {} fired ({}ms after due)", i, late.num_milliseconds());
            }
            if fails {
                panic!("task {} failed on purpose", i);
            }
        })
        .at(due);

        let mut options = TaskOptions::new().every(Duration::from_millis(args.every_ms));
        if let Some(repeat) = args.repeat {
            options = options.repeat(repeat);
        }
        scheduler.submit(task, options);
    }

    tokio::time::sleep(Duration::from_millis(args.for_ms)).await;

    println!("{} ({} pending)", "Stopping...".cyan(), scheduler.pending_len());
    scheduler.stop().await.context("Failed to stop scheduler")?;

    let stats = scheduler.stats();
    println!("{}", "Done".green());
    println!("  fired:       {}", fired.load(Ordering::SeqCst));
    println!("  ticks:       {}", stats.ticks);
    println!("  completed:   {}", stats.completed);
    if stats.failed > 0 {
        println!("  failed:      {}", stats.failed.to_string().red());
    } else {
        println!("  failed:      {}", stats.failed);
    }
    println!("  rescheduled: {}", stats.rescheduled);
    println!("  dropped:     {}", stats.dropped);
    println!("  peak batch:  {}", stats.peak_batch);
    Ok(())
}

fn handle_config_command(config: &SchedulerConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    println!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = SchedulerConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
