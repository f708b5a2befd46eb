//! Progress logging utilities.

use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error_handling::ProcessingStats;

/// Logs how many readings have been committed so far.
///
/// # Arguments
///
/// * `start_time` - The start time of processing
/// * `stats` - Shared processing statistics
pub fn log_progress(start_time: Instant, stats: &ProcessingStats) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let committed = stats.readings_committed();
    let rate = if elapsed_secs > 0.0 {
        committed as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Committed {} readings in {:.2} seconds (~{:.2} readings/sec), {} buffered, {} rejected",
        committed,
        elapsed_secs,
        rate,
        stats.buffered(),
        stats.readings_rejected()
    );
}

/// Logs progress every `interval` until `cancel` fires.
pub fn spawn_progress_logger(
    stats: Arc<ProcessingStats>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let start_time = Instant::now();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => log_progress(start_time, &stats),
            }
        }
    })
}
