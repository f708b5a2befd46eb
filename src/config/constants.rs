//! Configuration constants.
//!
//! Defaults for the batch consumer, the bundled broker, and the status server.

/// Default name of the durable queue readings are published to.
pub const DEFAULT_QUEUE_NAME: &str = "sensor data queue";
/// Default broker URL. The bundled transport serves `memory://` only.
pub const DEFAULT_BROKER_URL: &str = "memory://localhost";
/// Default SQLite database path.
pub const DB_PATH: &str = "./readings.db";

// Batching
/// Number of buffered readings that triggers an immediate flush
pub const BATCH_SIZE: usize = 10;
/// Flush timer in milliseconds, armed on the first arrival into an empty buffer
pub const BATCH_TIMEOUT_MS: u64 = 10_000;

// Retry strategy
/// Number of retries after the initial commit attempt before a batch is rejected
pub const MAX_RETRIES: u32 = 3;
/// Base retry delay in milliseconds; attempt `n` waits `RETRY_DELAY_MS * 2^n`
pub const RETRY_DELAY_MS: u64 = 5_000;
/// Factor by which the retry delay grows on each attempt
pub const RETRY_FACTOR: u32 = 2;

// Flow control
/// Broker prefetch is `PREFETCH_MULTIPLIER * batch_size`
pub const PREFETCH_MULTIPLIER: u16 = 2;
/// Number of ready messages the bundled broker holds before `publish` reports backpressure
pub const PUBLISH_BUFFER_CAPACITY: usize = 1_000;

// Bulk insert
/// Rows per INSERT statement; keeps bound parameters well below SQLite's limit
pub const INSERT_CHUNK_ROWS: usize = 500;

// Sensor simulator
/// Interval between simulated readings
pub const SENSOR_INTERVAL_MS: u64 = 1_000;
/// Simulated readings are drawn from `0..SENSOR_MAX_VALUE`
pub const SENSOR_MAX_VALUE: u32 = 100;

/// Progress logging interval in seconds
pub const LOGGING_INTERVAL: u64 = 30;
