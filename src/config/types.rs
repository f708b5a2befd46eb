//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    BATCH_SIZE, BATCH_TIMEOUT_MS, DB_PATH, DEFAULT_BROKER_URL, DEFAULT_QUEUE_NAME, MAX_RETRIES,
    PREFETCH_MULTIPLIER, PUBLISH_BUFFER_CAPACITY, RETRY_DELAY_MS, SENSOR_INTERVAL_MS,
};
use crate::error_handling::InitializationError;
use crate::ingest::BatchSettings;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Service configuration.
///
/// Parsed from the command line by `clap`; every option has a default, so the
/// struct can also be built programmatically with `..Default::default()`.
///
/// # Examples
///
/// ```bash
/// # Defaults: batch of 10, 10s flush timer, 3 retries starting at 5s
/// reading_ingest
///
/// # Smaller, faster batches against a custom database
/// reading_ingest --batch-size 5 --batch-timeout-ms 2000 --db-path ./speed.db
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reading_ingest",
    about = "Consumes readings from a durable queue and persists them to SQLite in batches."
)]
pub struct Config {
    /// Name of the durable queue readings are published to and consumed from
    #[arg(long, default_value = DEFAULT_QUEUE_NAME)]
    pub queue_name: String,

    /// Broker URL
    #[arg(long, env = "BROKER_URL", default_value = DEFAULT_BROKER_URL)]
    pub broker_url: String,

    /// Database path (SQLite file)
    #[arg(long, value_parser, default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Number of buffered readings that triggers an immediate flush
    #[arg(long, default_value_t = BATCH_SIZE)]
    pub batch_size: usize,

    /// Milliseconds after the first buffered reading before a partial batch is flushed
    #[arg(long, default_value_t = BATCH_TIMEOUT_MS)]
    pub batch_timeout_ms: u64,

    /// Retries after the first failed commit before the batch is rejected
    #[arg(long, default_value_t = MAX_RETRIES)]
    pub max_retries: u32,

    /// Base retry delay in milliseconds (doubles on each retry)
    #[arg(long, default_value_t = RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Broker prefetch as a multiple of the batch size
    #[arg(long, default_value_t = PREFETCH_MULTIPLIER)]
    pub prefetch_multiplier: u16,

    /// Stop pulling deliveries while the buffer holds this many batches (unbounded if unset)
    #[arg(long)]
    pub max_buffer_multiple: Option<usize>,

    /// Ready messages the bundled broker holds before publishing reports backpressure
    #[arg(long, default_value_t = PUBLISH_BUFFER_CAPACITY)]
    pub publish_buffer: usize,

    /// Interval between simulated sensor readings in milliseconds
    #[arg(long, default_value_t = SENSOR_INTERVAL_MS)]
    pub sensor_interval_ms: u64,

    /// Disable the built-in sensor simulator
    #[arg(long)]
    pub no_sensor: bool,

    /// HTTP status server port (optional, disabled by default)
    #[arg(long)]
    pub status_port: Option<u16>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            broker_url: DEFAULT_BROKER_URL.to_string(),
            db_path: PathBuf::from(DB_PATH),
            batch_size: BATCH_SIZE,
            batch_timeout_ms: BATCH_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            retry_delay_ms: RETRY_DELAY_MS,
            prefetch_multiplier: PREFETCH_MULTIPLIER,
            max_buffer_multiple: None,
            publish_buffer: PUBLISH_BUFFER_CAPACITY,
            sensor_interval_ms: SENSOR_INTERVAL_MS,
            no_sensor: false,
            status_port: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}

impl Config {
    /// Rejects settings the consumer cannot run with.
    pub fn validate(&self) -> Result<(), InitializationError> {
        if self.queue_name.trim().is_empty() {
            return Err(InitializationError::InvalidConfig(
                "queue name must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(InitializationError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.batch_timeout_ms == 0 {
            return Err(InitializationError::InvalidConfig(
                "batch timeout must be greater than zero".to_string(),
            ));
        }
        if self.prefetch_multiplier == 0 {
            return Err(InitializationError::InvalidConfig(
                "prefetch multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_buffer_multiple == Some(0) {
            return Err(InitializationError::InvalidConfig(
                "max buffer multiple must be at least 1 when set".to_string(),
            ));
        }
        if !self.no_sensor && self.sensor_interval_ms == 0 {
            return Err(InitializationError::InvalidConfig(
                "sensor interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Batch consumer settings derived from this configuration.
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            prefetch_multiplier: self.prefetch_multiplier,
            max_buffer_multiple: self.max_buffer_multiple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default_matches_constants() {
        let config = Config::default();
        assert_eq!(config.queue_name, "sensor data queue");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_timeout_ms, 10_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 5_000);
        assert_eq!(config.prefetch_multiplier, 2);
        assert!(config.max_buffer_multiple.is_none());
        assert_eq!(config.db_path, PathBuf::from("./readings.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let config = Config::try_parse_from([
            "reading_ingest",
            "--batch-size",
            "25",
            "--batch-timeout-ms",
            "2000",
            "--max-buffer-multiple",
            "4",
            "--no-sensor",
            "--log-format",
            "json",
        ])
        .expect("arguments should parse");

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_timeout_ms, 2000);
        assert_eq!(config.max_buffer_multiple, Some(4));
        assert!(config.no_sensor);
        assert!(matches!(config.log_format, LogFormat::Json));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            batch_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer_multiple() {
        let config = Config {
            max_buffer_multiple: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ignores_sensor_interval_when_disabled() {
        let config = Config {
            no_sensor: true,
            sensor_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_settings_conversion() {
        let config = Config {
            batch_size: 7,
            batch_timeout_ms: 1500,
            retry_delay_ms: 250,
            max_retries: 5,
            ..Default::default()
        };
        let settings = config.batch_settings();
        assert_eq!(settings.batch_size, 7);
        assert_eq!(settings.batch_timeout, Duration::from_millis(1500));
        assert_eq!(settings.retry_delay, Duration::from_millis(250));
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.prefetch_multiplier, 2);
    }
}
