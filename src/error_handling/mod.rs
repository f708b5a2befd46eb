//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions for the broker, the store, and the consumer
//! - Failure classification (malformed, transient, permanent, fatal)
//! - Retry delay computation
//! - Processing statistics tracking
//!
//! Every failure the consumer sees goes through [`classify`] so the handling
//! policy lives in one place.

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{classify, retry_delay, update_error_stats};
pub use stats::ProcessingStats;
pub use types::{
    BrokerError, DatabaseError, ErrorType, FailureKind, InfoType, IngestError,
    InitializationError, WarningType,
};
