//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `reading_ingest` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Ctrl-C handling
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::process;
use tokio_util::sync::CancellationToken;

use reading_ingest::broker::MemoryBroker;
use reading_ingest::initialization::init_logger_with;
use reading_ingest::{run_ingest, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists), e.g. BROKER_URL
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let broker = MemoryBroker::with_publish_capacity(config.publish_buffer);

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                on_signal.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    match run_ingest(config, &broker, shutdown).await {
        Ok(report) => {
            println!(
                "Committed {} reading{} in {} batch{} ({} rejected, {} requeued) in {:.1}s",
                report.consumer.committed_readings,
                if report.consumer.committed_readings == 1 { "" } else { "s" },
                report.consumer.committed_batches,
                if report.consumer.committed_batches == 1 { "" } else { "es" },
                report.consumer.rejected_readings,
                report.consumer.requeued_readings,
                report.elapsed_seconds
            );
            println!(
                "{} readings stored in {}",
                report.stored_readings,
                report.db_path.display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("reading_ingest error: {:#}", e);
            process::exit(1);
        }
    }
}
