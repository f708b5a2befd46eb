//! Failure classification and retry timing.

use std::time::Duration;

use crate::config::RETRY_FACTOR;

use super::stats::ProcessingStats;
use super::types::{ErrorType, FailureKind, IngestError};

/// Maps a consumer error to the way it is handled.
///
/// `attempt` is the zero-based commit attempt that produced the error and
/// `max_retries` the number of retries allowed after the first attempt; both
/// only matter for store failures.
pub fn classify(error: &IngestError, attempt: u32, max_retries: u32) -> FailureKind {
    match error {
        IngestError::MalformedMessage { .. } => FailureKind::Malformed,
        IngestError::Database(_) if attempt < max_retries => FailureKind::Transient,
        IngestError::Database(_) => FailureKind::Permanent,
        IngestError::Broker(_) | IngestError::ConsumerCancelled => FailureKind::Fatal,
    }
}

/// Delay before retrying after the failure of `attempt` (zero-based).
///
/// `base * 2^attempt`, saturating at `Duration::MAX`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    RETRY_FACTOR
        .checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

/// Records a classified failure in the processing statistics.
pub fn update_error_stats(stats: &ProcessingStats, kind: FailureKind) {
    match kind {
        FailureKind::Malformed => stats.increment_error(ErrorType::MalformedMessage),
        FailureKind::Transient => stats.increment_error(ErrorType::StoreWriteFailure),
        FailureKind::Permanent => {
            stats.increment_error(ErrorType::StoreWriteFailure);
            stats.increment_error(ErrorType::BatchRejected);
        }
        FailureKind::Fatal => stats.increment_error(ErrorType::BrokerChannelError),
    }
}
