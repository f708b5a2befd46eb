//! Statistics printing.

use anyhow::{Context, Result};
use log::info;
use sqlx::SqlitePool;
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorType, InfoType, ProcessingStats, WarningType};
use crate::ingest::ConsumerReport;
use crate::storage::count_readings;

/// Prints the run summary and the per-category counters.
///
/// Returns the number of readings stored in the database, including rows
/// written by earlier runs.
pub async fn print_final_statistics(
    pool: &SqlitePool,
    report: &ConsumerReport,
    stats: &ProcessingStats,
    elapsed_seconds: f64,
) -> Result<i64> {
    let stored = count_readings(pool)
        .await
        .context("Failed to count stored readings")?;

    print_error_statistics(stats);

    info!(
        "✅ Committed {} reading{} in {} batch{} ({} rejected, {} requeued, {} malformed) in {:.1}s; {} readings stored",
        report.committed_readings,
        if report.committed_readings == 1 { "" } else { "s" },
        report.committed_batches,
        if report.committed_batches == 1 { "" } else { "es" },
        report.rejected_readings,
        report.requeued_readings,
        report.malformed_messages,
        elapsed_seconds,
        stored
    );

    Ok(stored)
}

/// Prints error, warning, and info statistics to the log.
pub fn print_error_statistics(error_stats: &ProcessingStats) {
    let total_errors = error_stats.total_errors();
    let total_warnings = error_stats.total_warnings();
    let total_info = error_stats.total_info();

    if total_errors > 0 {
        info!("Error Counts ({} total):", total_errors);
        for error_type in ErrorType::iter() {
            let count = error_stats.get_error_count(error_type);
            if count > 0 {
                info!("   {}: {}", error_type.as_str(), count);
            }
        }
    }

    if total_warnings > 0 {
        info!("Warning Counts ({} total):", total_warnings);
        for warning_type in WarningType::iter() {
            let count = error_stats.get_warning_count(warning_type);
            if count > 0 {
                info!("   {}: {}", warning_type.as_str(), count);
            }
        }
    }

    if total_info > 0 {
        info!("Info Counts ({} total):", total_info);
        for info_type in InfoType::iter() {
            let count = error_stats.get_info_count(info_type);
            if count > 0 {
                info!("   {}: {}", info_type.as_str(), count);
            }
        }
    }
}
