//! Processing statistics tracking.
//!
//! Thread-safe counters for errors, warnings, and informational events, plus
//! the reading totals and buffer gauge reported by the status server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::{ErrorType, InfoType, WarningType};

/// Thread-safe processing statistics tracker.
///
/// All categories are initialized to zero on creation and updated with atomic
/// operations, so one instance can be shared through an `Arc` between the
/// consumer, the publisher, and the status server.
pub struct ProcessingStats {
    errors: HashMap<ErrorType, AtomicUsize>,
    warnings: HashMap<WarningType, AtomicUsize>,
    info: HashMap<InfoType, AtomicUsize>,
    readings_published: AtomicUsize,
    readings_committed: AtomicUsize,
    readings_rejected: AtomicUsize,
    buffered: AtomicUsize,
}

impl ProcessingStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        ProcessingStats {
            errors: ErrorType::iter().map(|e| (e, AtomicUsize::new(0))).collect(),
            warnings: WarningType::iter()
                .map(|w| (w, AtomicUsize::new(0)))
                .collect(),
            info: InfoType::iter().map(|i| (i, AtomicUsize::new(0))).collect(),
            readings_published: AtomicUsize::new(0),
            readings_committed: AtomicUsize::new(0),
            readings_rejected: AtomicUsize::new(0),
            buffered: AtomicUsize::new(0),
        }
    }

    /// Increment an error counter.
    pub fn increment_error(&self, error: ErrorType) {
        if let Some(counter) = self.errors.get(&error) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment error counter for {:?} which is not in the map",
                error
            );
        }
    }

    /// Increment a warning counter.
    pub fn increment_warning(&self, warning: WarningType) {
        if let Some(counter) = self.warnings.get(&warning) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment warning counter for {:?} which is not in the map",
                warning
            );
        }
    }

    /// Increment an info counter.
    pub fn increment_info(&self, info_type: InfoType) {
        if let Some(counter) = self.info.get(&info_type) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment info counter for {:?} which is not in the map",
                info_type
            );
        }
    }

    /// Get the count for an error type.
    pub fn get_error_count(&self, error: ErrorType) -> usize {
        self.errors
            .get(&error)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get the count for a warning type.
    pub fn get_warning_count(&self, warning: WarningType) -> usize {
        self.warnings
            .get(&warning)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get the count for an info type.
    pub fn get_info_count(&self, info_type: InfoType) -> usize {
        self.info
            .get(&info_type)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get total error count across all error types.
    pub fn total_errors(&self) -> usize {
        ErrorType::iter().map(|e| self.get_error_count(e)).sum()
    }

    /// Get total warning count across all warning types.
    pub fn total_warnings(&self) -> usize {
        WarningType::iter().map(|w| self.get_warning_count(w)).sum()
    }

    /// Get total info count across all info types.
    pub fn total_info(&self) -> usize {
        InfoType::iter().map(|i| self.get_info_count(i)).sum()
    }

    /// Counts one reading accepted by the queue.
    pub fn record_published(&self) {
        self.readings_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts readings written and acknowledged.
    pub fn record_committed(&self, readings: usize) {
        self.readings_committed
            .fetch_add(readings, Ordering::Relaxed);
    }

    /// Counts readings rejected after retries were exhausted.
    pub fn record_rejected(&self, readings: usize) {
        self.readings_rejected.fetch_add(readings, Ordering::Relaxed);
    }

    /// Current number of readings held in the consumer buffer.
    pub fn set_buffered(&self, readings: usize) {
        self.buffered.store(readings, Ordering::Relaxed);
    }

    /// Readings accepted by the queue so far.
    pub fn readings_published(&self) -> usize {
        self.readings_published.load(Ordering::SeqCst)
    }

    /// Readings committed so far.
    pub fn readings_committed(&self) -> usize {
        self.readings_committed.load(Ordering::SeqCst)
    }

    /// Readings rejected so far.
    pub fn readings_rejected(&self) -> usize {
        self.readings_rejected.load(Ordering::SeqCst)
    }

    /// Readings currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}
