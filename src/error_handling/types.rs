//! Error type definitions.
//!
//! This module defines the error types of the consumer and the error, warning,
//! and info categories counted in [`ProcessingStats`](super::ProcessingStats).

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::broker::DeliveryTag;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// A configuration value the consumer cannot run with.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// The store could not be reached or the write did not complete.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Error types for broker operations.
///
/// Connection and channel errors are logged and surfaced to the caller; the
/// consumer never reconnects on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached or the URL is not served by the connector.
    #[error("Broker connection error: {0}")]
    ConnectionError(String),

    /// The channel rejected an operation or is closed.
    #[error("Broker channel error: {0}")]
    ChannelError(String),

    /// The queue has not been declared on this broker.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Ack or nack for a tag that was never delivered or was already settled.
    #[error("Unknown delivery tag {0}")]
    UnknownDeliveryTag(DeliveryTag),

    /// A consumer is already registered on the queue.
    #[error("Queue {0} already has an active consumer")]
    ConsumerExists(String),
}

/// Errors raised while consuming and committing readings.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The message body did not parse as a reading.
    #[error("Malformed message (delivery tag {tag}): {source}")]
    MalformedMessage {
        /// Tag of the rejected message
        tag: DeliveryTag,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// The broker cancelled the consumer.
    #[error("Consumer cancelled by broker")]
    ConsumerCancelled,

    /// A broker operation failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A store write failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// How a failure is handled by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected immediately without requeue; never buffered.
    Malformed,
    /// Retried with exponential backoff; batch preserved.
    Transient,
    /// Retries exhausted; batch rejected without requeue and logged.
    Permanent,
    /// The consumer cannot proceed; left to external supervision.
    Fatal,
}

/// Types of errors counted during consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    /// A message body that is not a reading
    MalformedMessage,
    /// A failed store write, retried or not
    StoreWriteFailure,
    /// A batch rejected after its last retry
    BatchRejected,
    /// An ack or nack for an unknown tag
    SettleFailure,
    /// A broker failure that stopped the consumer
    BrokerChannelError,
}

/// Types of warnings counted during consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    /// Consumption paused at the buffer bound
    BufferLimitReached,
    /// A publish refused by a full send buffer
    PublishBackpressure,
    /// Readings requeued after a failed final flush
    ShutdownRequeue,
}

/// Informational events counted during consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// Capture triggered by the batch size
    FlushBySize,
    /// Capture triggered by the flush timer
    FlushByTimeout,
    /// Trigger ignored because a commit was in flight
    FlushSkippedInFlight,
    /// Batch written and acknowledged
    BatchCommitted,
    /// Failed write scheduled for retry
    BatchRetried,
    /// Consumer cancelled by the broker
    ConsumerCancelled,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::MalformedMessage => "Malformed message",
            ErrorType::StoreWriteFailure => "Store write failure",
            ErrorType::BatchRejected => "Batch rejected after retries",
            ErrorType::SettleFailure => "Ack/nack failure",
            ErrorType::BrokerChannelError => "Broker channel error",
        }
    }
}

impl WarningType {
    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::BufferLimitReached => "Buffer limit reached",
            WarningType::PublishBackpressure => "Publish backpressure",
            WarningType::ShutdownRequeue => "Requeued on shutdown",
        }
    }
}

impl InfoType {
    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::FlushBySize => "Flush by size",
            InfoType::FlushByTimeout => "Flush by timeout",
            InfoType::FlushSkippedInFlight => "Flush skipped (commit in flight)",
            InfoType::BatchCommitted => "Batch committed",
            InfoType::BatchRetried => "Batch retried",
            InfoType::ConsumerCancelled => "Consumer cancelled",
        }
    }
}
