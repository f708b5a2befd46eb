//! Ingestion buffer and captured batches.

use std::collections::VecDeque;

use crate::broker::DeliveryTag;
use crate::models::Reading;

/// A reading paired with the delivery tag that settles its message.
///
/// The two always travel together: into the buffer, into a batch, and back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingReading {
    /// The parsed reading
    pub reading: Reading,
    /// Tag of the message the reading arrived in
    pub tag: DeliveryTag,
}

/// An ordered set of pending readings captured from the buffer.
///
/// Immutable once captured. A batch is either committed and acknowledged as
/// a whole, returned as a whole to the front of the buffer, or rejected as a
/// whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    entries: Vec<PendingReading>,
}

impl Batch {
    /// Number of readings in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch holds no readings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Readings and tags in arrival order.
    pub fn entries(&self) -> &[PendingReading] {
        &self.entries
    }

    /// Readings in arrival order, as handed to the store.
    pub fn readings(&self) -> Vec<Reading> {
        self.entries.iter().map(|entry| entry.reading).collect()
    }

    /// Reading values in arrival order.
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.reading.value).collect()
    }

    /// Delivery tags in arrival order.
    pub fn tags(&self) -> impl Iterator<Item = DeliveryTag> + '_ {
        self.entries.iter().map(|entry| entry.tag)
    }
}

/// Readings received since the last capture, oldest first.
#[derive(Debug, Default)]
pub struct IngestionBuffer {
    pending: VecDeque<PendingReading>,
}

impl IngestionBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reading. Returns `true` if the buffer was empty before.
    pub fn push(&mut self, entry: PendingReading) -> bool {
        let was_empty = self.pending.is_empty();
        self.pending.push_back(entry);
        was_empty
    }

    /// Captures up to `count` of the oldest readings as a batch.
    pub fn take_front(&mut self, count: usize) -> Batch {
        let count = count.min(self.pending.len());
        Batch {
            entries: self.pending.drain(..count).collect(),
        }
    }

    /// Captures everything buffered as a batch, leaving the buffer empty.
    pub fn take_all(&mut self) -> Batch {
        Batch {
            entries: self.pending.drain(..).collect(),
        }
    }

    /// Returns a batch to the front of the buffer, ahead of newer arrivals
    /// and in its original order.
    pub fn prepend(&mut self, batch: Batch) {
        for entry in batch.entries.into_iter().rev() {
            self.pending.push_front(entry);
        }
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: DeliveryTag) -> PendingReading {
        PendingReading {
            reading: Reading {
                value: tag as f64,
                observed_at_ms: 0,
            },
            tag,
        }
    }

    #[test]
    fn test_push_reports_first_arrival() {
        let mut buffer = IngestionBuffer::new();
        assert!(buffer.push(entry(1)));
        assert!(!buffer.push(entry(2)));
        buffer.take_all();
        assert!(buffer.push(entry(3)));
    }

    #[test]
    fn test_take_front_leaves_newer_readings() {
        let mut buffer = IngestionBuffer::new();
        for tag in 1..=5 {
            buffer.push(entry(tag));
        }

        let batch = buffer.take_front(3);
        assert_eq!(batch.tags().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(buffer.len(), 2);

        let rest = buffer.take_front(10);
        assert_eq!(rest.values(), vec![4.0, 5.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prepend_restores_order_ahead_of_new_arrivals() {
        let mut buffer = IngestionBuffer::new();
        for tag in 1..=3 {
            buffer.push(entry(tag));
        }
        let batch = buffer.take_all();
        buffer.push(entry(4));
        buffer.push(entry(5));

        buffer.prepend(batch);
        let all = buffer.take_all();
        assert_eq!(all.tags().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_captured_batch_is_disjoint_from_buffer() {
        let mut buffer = IngestionBuffer::new();
        buffer.push(entry(1));
        buffer.push(entry(2));
        let batch = buffer.take_all();
        buffer.push(entry(3));

        assert_eq!(batch.len(), 2);
        assert!(batch.tags().all(|tag| tag != 3));
        assert_eq!(buffer.len(), 1);
    }
}
