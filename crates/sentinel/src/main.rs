//! Footprint Sentinel CLI
//!
//! Rates transfer sizes, replays recorded page traces and watches live host
//! message streams.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{rate, replay, watch};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Footprint Sentinel CLI
#[derive(Parser)]
#[command(name = "footprint-sentinel")]
#[command(author, version, about = "Track and rate the transfer footprint of web pages", long_about = None)]
pub struct Cli {
    /// Sentinel options file (toml, json or yaml)
    #[arg(long, short, env = "SENTINEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose logging (ignored when RUST_LOG is set)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rate a transfer size in bytes
    Rate {
        /// Transfer size in bytes
        bytes: u64,

        /// Also print the full rating scale
        #[arg(long)]
        scale: bool,
    },

    /// Replay a recorded host trace
    Replay {
        /// Trace file: JSON array of {"at_ms", "message"} steps
        trace: PathBuf,

        /// Time to keep timers running after the last step
        #[arg(long, default_value_t = 3000)]
        settle_ms: u64,

        /// Print Prometheus metrics to stderr afterwards
        #[arg(long)]
        metrics: bool,
    },

    /// Read host messages as JSON lines from stdin and emit footprint events
    Watch {
        /// Time to keep timers running after stdin closes
        #[arg(long, default_value_t = 3000)]
        settle_ms: u64,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Rate { bytes, scale } => {
            rate::rate(bytes, scale, cli.format)?;
        }
        Commands::Replay {
            trace,
            settle_ms,
            metrics,
        } => {
            let options = config::load_options(cli.config.as_deref())?;
            debug!(trace = %trace.display(), settle_ms, "Replaying trace");
            replay::replay(&trace, settle_ms, options, metrics, cli.format)?;
        }
        Commands::Watch { settle_ms } => {
            let options = config::load_options(cli.config.as_deref())?;
            watch::watch(options, Duration::from_millis(settle_ms)).await?;
        }
    }

    Ok(())
}
