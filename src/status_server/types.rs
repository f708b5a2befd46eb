//! Status server data structures.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::error_handling::{ErrorType, InfoType, ProcessingStats, WarningType};

/// Shared state for the status server
#[derive(Clone)]
pub struct StatusState {
    /// When the server state was created
    pub start_time: Arc<Instant>,
    /// Counters shared with the consumer
    pub stats: Arc<ProcessingStats>,
}

impl StatusState {
    /// Creates state that starts its clock now.
    pub fn new(stats: Arc<ProcessingStats>) -> Self {
        StatusState {
            start_time: Arc::new(Instant::now()),
            stats,
        }
    }

    /// Snapshot of the counters as served by `/status`.
    pub fn snapshot(&self) -> StatusResponse {
        let stats = &self.stats;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let committed = stats.readings_committed();

        StatusResponse {
            elapsed_seconds: elapsed,
            commit_rate_per_second: if elapsed > 0.0 {
                committed as f64 / elapsed
            } else {
                0.0
            },
            readings: ReadingCounts {
                published: stats.readings_published(),
                committed,
                rejected: stats.readings_rejected(),
                buffered: stats.buffered(),
            },
            batches: BatchCounts {
                committed: stats.get_info_count(InfoType::BatchCommitted),
                retried: stats.get_info_count(InfoType::BatchRetried),
                flushed_by_size: stats.get_info_count(InfoType::FlushBySize),
                flushed_by_timeout: stats.get_info_count(InfoType::FlushByTimeout),
                flushes_skipped_in_flight: stats.get_info_count(InfoType::FlushSkippedInFlight),
            },
            errors: ErrorCounts {
                total: stats.total_errors(),
                malformed_message: stats.get_error_count(ErrorType::MalformedMessage),
                store_write_failure: stats.get_error_count(ErrorType::StoreWriteFailure),
                batch_rejected: stats.get_error_count(ErrorType::BatchRejected),
                settle_failure: stats.get_error_count(ErrorType::SettleFailure),
                broker_channel_error: stats.get_error_count(ErrorType::BrokerChannelError),
            },
            warnings: WarningCounts {
                total: stats.total_warnings(),
                buffer_limit_reached: stats.get_warning_count(WarningType::BufferLimitReached),
                publish_backpressure: stats.get_warning_count(WarningType::PublishBackpressure),
                shutdown_requeue: stats.get_warning_count(WarningType::ShutdownRequeue),
            },
        }
    }
}

/// JSON response for `/status` endpoint
#[derive(Serialize)]
pub struct StatusResponse {
    pub elapsed_seconds: f64,
    pub commit_rate_per_second: f64,
    pub readings: ReadingCounts,
    pub batches: BatchCounts,
    pub errors: ErrorCounts,
    pub warnings: WarningCounts,
}

#[derive(Serialize)]
pub struct ReadingCounts {
    pub published: usize,
    pub committed: usize,
    pub rejected: usize,
    pub buffered: usize,
}

#[derive(Serialize)]
pub struct BatchCounts {
    pub committed: usize,
    pub retried: usize,
    pub flushed_by_size: usize,
    pub flushed_by_timeout: usize,
    pub flushes_skipped_in_flight: usize,
}

#[derive(Serialize)]
pub struct ErrorCounts {
    pub total: usize,
    pub malformed_message: usize,
    pub store_write_failure: usize,
    pub batch_rejected: usize,
    pub settle_failure: usize,
    pub broker_channel_error: usize,
}

#[derive(Serialize)]
pub struct WarningCounts {
    pub total: usize,
    pub buffer_limit_reached: usize,
    pub publish_backpressure: usize,
    pub shutdown_requeue: usize,
}
