//! Flush trigger: batch size or flush timer, whichever comes first.

use std::time::Duration;

use tokio::time::Instant;

/// Decides when the buffer is flushed.
///
/// The timer is armed when the buffer goes from empty to non-empty and
/// cleared when a batch is captured or the timer has fired. The scheduler
/// only holds the deadline; the consumer's event loop sleeps on it.
#[derive(Debug)]
pub struct BatchScheduler {
    batch_size: usize,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl BatchScheduler {
    /// Creates an unarmed scheduler.
    pub fn new(batch_size: usize, timeout: Duration) -> Self {
        BatchScheduler {
            batch_size,
            timeout,
            deadline: None,
        }
    }

    /// Updates the timer for a new arrival and reports whether the buffer
    /// has reached the batch size.
    pub fn on_arrival(&mut self, became_non_empty: bool, buffered: usize) -> bool {
        if became_non_empty {
            self.arm();
        }
        self.size_reached(buffered)
    }

    /// Arms the flush timer unless it is already running.
    pub fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(deadline_after(self.timeout));
        }
    }

    /// Disarms the flush timer.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Whether `buffered` readings make a full batch.
    pub fn size_reached(&self, buffered: usize) -> bool {
        buffered >= self.batch_size
    }

    /// Number of readings that triggers a flush.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// When the armed timer fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the flush timer is running.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

/// `now + delay`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}
