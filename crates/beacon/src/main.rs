//! Beacon - game analytics rollups
//!
//! # Usage
//!
//! ```bash
//! # Studio rollup over the last week
//! beacon rollup space-miner tower-rush --range 7d
//!
//! # One game, hourly buckets, whales only
//! beacon timeline space-miner --range today --segment whales
//!
//! # Cohort retention
//! beacon retention space-miner --range 2024-01-01,2024-01-14
//!
//! # Store connectivity
//! beacon check --config configs/beacon.toml
//! ```

mod cmd;

use anyhow::Result;
use beacon_config::{Config, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Beacon - game analytics rollups
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true, env = "BEACON_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Roll up several entities into one timeline
    Rollup(cmd::rollup::RollupArgs),

    /// Timeline of a single entity
    Timeline(cmd::timeline::TimelineArgs),

    /// Cohort retention of a single entity
    Retention(cmd::retention::RetentionArgs),

    /// Check store connectivity
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cmd::load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    match cli.command {
        Command::Rollup(args) => cmd::rollup::run(args, &config).await,
        Command::Timeline(args) => cmd::timeline::run(args, &config).await,
        Command::Retention(args) => cmd::retention::run(args, &config).await,
        Command::Check => cmd::check::run(&config).await,
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    config.log.level.as_str().to_string()
}

/// Initialize the tracing subscriber; logs go to stderr so stdout stays parseable
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}
