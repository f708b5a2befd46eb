//! Single-flight batch committer.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error_handling::{classify, retry_delay, DatabaseError, FailureKind, IngestError};
use crate::storage::ReadingStore;

use super::buffer::Batch;
use super::scheduler::deadline_after;

/// Result of one resolved commit attempt.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Every reading was written; the batch must be acknowledged.
    Committed {
        /// The committed batch
        batch: Batch,
        /// Zero-based attempt that succeeded
        attempt: u32,
    },
    /// The write failed and will be retried after `delay`. The batch goes
    /// back to the front of the buffer until then.
    Retry {
        /// The batch to return to the buffer
        batch: Batch,
        /// Zero-based number of the attempt that will run next
        next_attempt: u32,
        /// Wait before the next attempt
        delay: Duration,
        /// Why the write failed
        error: IngestError,
    },
    /// Retries are exhausted; the batch must be rejected without requeue.
    Rejected {
        /// The batch to reject
        batch: Batch,
        /// Total attempts made, the first included
        attempts: u32,
        /// Error of the last attempt
        error: IngestError,
    },
}

enum Phase {
    Idle,
    Writing {
        batch: Batch,
        attempt: u32,
        handle: JoinHandle<Result<u64, DatabaseError>>,
    },
    /// The failed batch sits at the front of the buffer; the guard stays
    /// held until the retry fires.
    AwaitingRetry {
        attempt: u32,
        batch_len: usize,
        retry_at: Instant,
    },
}

/// Writes captured batches to the store, one at a time.
///
/// Each write runs as its own task so the consumer keeps buffering
/// deliveries while it is outstanding. The committer is busy from the moment
/// a batch is captured until it is committed or rejected, including the time
/// spent waiting for a retry.
pub struct BatchCommitter {
    store: Arc<dyn ReadingStore>,
    max_retries: u32,
    retry_delay: Duration,
    phase: Phase,
}

impl BatchCommitter {
    /// Creates an idle committer writing to `store`.
    pub fn new(store: Arc<dyn ReadingStore>, max_retries: u32, retry_delay: Duration) -> Self {
        BatchCommitter {
            store,
            max_retries,
            retry_delay,
            phase: Phase::Idle,
        }
    }

    /// The store batches are written to.
    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// Whether a batch is being written or waiting for its retry.
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Whether a store write is outstanding.
    pub fn is_writing(&self) -> bool {
        matches!(self.phase, Phase::Writing { .. })
    }

    /// Starts writing `batch`. Must only be called while idle.
    pub fn begin(&mut self, batch: Batch, attempt: u32) {
        debug_assert!(!self.is_busy(), "commit started while another is in flight");
        debug!(
            "Writing batch of {} readings (attempt {})",
            batch.len(),
            attempt + 1
        );
        let store = Arc::clone(&self.store);
        let readings = batch.readings();
        let handle = tokio::spawn(async move { store.insert_batch(&readings).await });
        self.phase = Phase::Writing {
            batch,
            attempt,
            handle,
        };
    }

    /// Waits for the outstanding write. Never resolves when nothing is being
    /// written, so it can sit in a `select!` unconditionally.
    ///
    /// Cancel-safe; the result must be passed to [`resolve`](Self::resolve)
    /// before this is awaited again.
    pub async fn wait_write(&mut self) -> Result<u64, DatabaseError> {
        match &mut self.phase {
            Phase::Writing { handle, .. } => match handle.await {
                Ok(result) => result,
                Err(e) => Err(DatabaseError::Unavailable(format!(
                    "store write task failed: {e}"
                ))),
            },
            _ => std::future::pending().await,
        }
    }

    /// Turns the result of the outstanding write into an outcome and moves
    /// the committer to its next phase. Returns `None` if nothing was being
    /// written.
    pub fn resolve(&mut self, result: Result<u64, DatabaseError>) -> Option<CommitOutcome> {
        let Phase::Writing { batch, attempt, .. } =
            std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return None;
        };

        let error = match result {
            Ok(_) => return Some(CommitOutcome::Committed { batch, attempt }),
            Err(e) => IngestError::Database(e),
        };

        match classify(&error, attempt, self.max_retries) {
            FailureKind::Transient => {
                let delay = retry_delay(self.retry_delay, attempt);
                self.phase = Phase::AwaitingRetry {
                    attempt: attempt + 1,
                    batch_len: batch.len(),
                    retry_at: deadline_after(delay),
                };
                Some(CommitOutcome::Retry {
                    batch,
                    next_attempt: attempt + 1,
                    delay,
                    error,
                })
            }
            _ => Some(CommitOutcome::Rejected {
                batch,
                attempts: attempt + 1,
                error,
            }),
        }
    }

    /// When the pending retry fires, if one is pending.
    pub fn retry_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::AwaitingRetry { retry_at, .. } => Some(retry_at),
            _ => None,
        }
    }

    /// Releases a pending retry, returning its attempt number and the number
    /// of readings to recapture from the front of the buffer.
    pub fn take_retry(&mut self) -> Option<(u32, usize)> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::AwaitingRetry {
                attempt, batch_len, ..
            } => Some((attempt, batch_len)),
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Drops a pending retry without running it. Returns `true` if one was
    /// pending.
    pub fn abandon_retry(&mut self) -> bool {
        self.take_retry().is_some()
    }
}
