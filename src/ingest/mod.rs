//! Batch ingestion consumer.
//!
//! Deliveries from the queue are held in an [`IngestionBuffer`] until the
//! [`BatchScheduler`] decides to flush (batch size reached, or the flush
//! timer elapsed). The [`BatchCommitter`] then writes the captured batch to
//! the store and the consumer acknowledges every message of the batch, or
//! retries with exponential backoff, or finally rejects the whole batch.
//! At most one commit is ever in flight.
//!
//! All of this state is owned by a single task, [`BatchConsumer::run`].

mod buffer;
mod committer;
mod consumer;
mod flow;
mod scheduler;

use std::time::Duration;

pub use buffer::{Batch, IngestionBuffer, PendingReading};
pub use committer::{BatchCommitter, CommitOutcome};
pub use consumer::{BatchConsumer, ConsumerReport};
pub use flow::FlowController;
pub use scheduler::BatchScheduler;

use crate::config::{BATCH_SIZE, BATCH_TIMEOUT_MS, MAX_RETRIES, PREFETCH_MULTIPLIER, RETRY_DELAY_MS};

/// Tuning of the batch consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Buffered readings that trigger an immediate flush; also the largest batch written
    pub batch_size: usize,
    /// Delay between the first reading entering an empty buffer and a timed flush
    pub batch_timeout: Duration,
    /// Retries after the first failed attempt before a batch is rejected
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry
    pub retry_delay: Duration,
    /// Broker prefetch as a multiple of `batch_size`
    pub prefetch_multiplier: u16,
    /// Pause consumption while `max_buffer_multiple * batch_size` readings are buffered
    pub max_buffer_multiple: Option<usize>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            batch_size: BATCH_SIZE,
            batch_timeout: Duration::from_millis(BATCH_TIMEOUT_MS),
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            prefetch_multiplier: PREFETCH_MULTIPLIER,
            max_buffer_multiple: None,
        }
    }
}
