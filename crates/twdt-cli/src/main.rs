//! twdt-sim - task watchdog host simulator
//!
//! Runs a task watchdog on the host with a thread-driven timer, idle loops
//! for the watched cores, and worker threads that check in as named users.
//! One worker can be told to stall so the timeout report can be observed.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod config;
mod error;
mod sim;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Overrides;
use crate::error::CliError;
use crate::sim::{Scenario, Stall};

#[derive(Parser)]
#[command(name = "twdt-sim")]
#[command(about = "Task watchdog host simulator")]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Watchdog configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Timeout period in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u32>,

    /// Bitmask of cores whose idle task is watched
    #[arg(long, global = true, value_parser = parse_mask)]
    idle_mask: Option<u32>,

    /// Abort instead of only reporting on timeout
    #[arg(long, global = true)]
    panic: bool,

    /// Number of simulated cores (defaults to the host CPU count)
    #[arg(long, global = true)]
    cores: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run workers and idle loops against the watchdog
    Run {
        /// Number of worker threads
        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        /// Interval between check-ins in milliseconds
        #[arg(long, default_value_t = 50)]
        feed_interval_ms: u64,

        /// Run time in milliseconds
        #[arg(short, long, default_value_t = 2_000)]
        duration_ms: u64,

        /// Worker index that stops checking in
        #[arg(long)]
        stall: Option<usize>,

        /// Milliseconds before the stalled worker goes silent
        #[arg(long, default_value_t = 500, requires = "stall")]
        stall_after_ms: u64,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn parse_mask(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0b") {
        Some(bits) => u32::from_str_radix(bits, 2),
        None => match value.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => value.parse(),
        },
    };
    parsed.map_err(|e| format!("invalid core mask '{value}': {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("twdt={log_level},twdt_timer={log_level},twdt_sim={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {cause}");
            }
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let cores = cli
        .cores
        .unwrap_or_else(|| twdt::Platform::core_count(&twdt::HostPlatform::new()));
    let overrides = Overrides {
        timeout_ms: cli.timeout_ms,
        idle_core_mask: cli.idle_mask,
        trigger_panic: cli.panic.then_some(true),
    };
    let config = config::load(cli.config.as_deref(), overrides, cores)?;

    match &cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            workers,
            feed_interval_ms,
            duration_ms,
            stall,
            stall_after_ms,
        } => {
            if let Some(worker) = stall {
                if *worker >= *workers {
                    return Err(CliError::InvalidConfiguration(format!(
                        "stalled worker {worker} does not exist ({workers} workers)"
                    ))
                    .into());
                }
            }
            let scenario = Scenario {
                config,
                cores,
                workers: *workers,
                feed_interval: Duration::from_millis(*feed_interval_ms),
                duration: Duration::from_millis(*duration_ms),
                stall: stall.map(|worker| Stall {
                    worker,
                    after: Duration::from_millis(*stall_after_ms),
                }),
            };
            tracing::info!(?scenario, "Starting simulation");
            let summary = sim::run(&scenario)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
