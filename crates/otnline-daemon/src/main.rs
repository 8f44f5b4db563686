//! otnline daemon - main entry point
//!
//! Builds the engine from configuration, provisions objects, replays
//! telemetry and reports statistics.

mod config;
mod state;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use otnline_core::catalog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "otnline")]
#[command(about = "Optical line-system configuration and telemetry daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "otnline.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the registered object schemas as JSON and exit
    #[arg(long)]
    dump_schema: bool,

    /// Replay telemetry, print one statistics report and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.dump_schema {
        let registry = catalog::standard_registry()?;
        println!("{}", serde_json::to_string_pretty(&registry.schemas())?);
        return Ok(());
    }

    info!("otnline v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    let state = AppState::new(config)?;

    let (tx, rx) = mpsc::channel(256);
    let ingest = telemetry::spawn_ingest(state.clone(), rx);
    let replay = state
        .config
        .telemetry
        .replay
        .clone()
        .map(|path| telemetry::spawn_replay(path, tx));

    if args.once {
        // Replay drops the sender when it finishes, which ends ingestion
        if let Some(replay) = replay {
            replay.await.context("replay task panicked")??;
        }
        let applied = ingest.await.context("ingest task panicked")?;
        info!(samples = applied, "Telemetry applied");
        for entry in state.report() {
            println!("{}", serde_json::to_string(&entry)?);
        }
        return Ok(());
    }

    run(state).await
}

/// Log statistics periodically until interrupted
async fn run(state: Arc<AppState>) -> Result<()> {
    let secs = state.config.telemetry.report_interval_secs;
    if secs == 0 {
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => log_report(&state),
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "Signal handler failed");
                }
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn log_report(state: &AppState) {
    for entry in state.report() {
        info!(
            object = %entry.key,
            object_type = %entry.object_type,
            quantity = entry.quantity,
            unit = entry.unit,
            instant = entry.instant,
            average = ?entry.average,
            minimum = ?entry.minimum,
            maximum = ?entry.maximum,
            "Statistics"
        );
    }
}
