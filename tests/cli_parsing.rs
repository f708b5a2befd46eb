//! Tests for command-line parsing and configuration validation.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reading_ingest::{Config, LogFormat, LogLevel};

fn parse(args: &[&str]) -> Result<Config, clap::Error> {
    Config::try_parse_from(std::iter::once("reading_ingest").chain(args.iter().copied()))
}

#[test]
fn test_defaults() {
    let config = parse(&[]).unwrap();
    assert_eq!(config.queue_name, "sensor data queue");
    assert_eq!(config.batch_size, 10);
    assert_eq!(config.batch_timeout_ms, 10_000);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_delay_ms, 5_000);
    assert_eq!(config.prefetch_multiplier, 2);
    assert_eq!(config.db_path, PathBuf::from("./readings.db"));
    assert!(config.status_port.is_none());
    assert!(!config.no_sensor);
    assert!(matches!(config.log_level, LogLevel::Info));
    assert!(matches!(config.log_format, LogFormat::Plain));
}

#[test]
fn test_all_options() {
    let config = parse(&[
        "--queue-name",
        "speed",
        "--broker-url",
        "memory://test",
        "--db-path",
        "/tmp/speed.db",
        "--batch-size",
        "50",
        "--batch-timeout-ms",
        "500",
        "--max-retries",
        "5",
        "--retry-delay-ms",
        "100",
        "--prefetch-multiplier",
        "3",
        "--max-buffer-multiple",
        "2",
        "--publish-buffer",
        "64",
        "--sensor-interval-ms",
        "250",
        "--status-port",
        "8080",
        "--log-level",
        "debug",
        "--log-format",
        "json",
    ])
    .unwrap();

    assert_eq!(config.queue_name, "speed");
    assert_eq!(config.broker_url, "memory://test");
    assert_eq!(config.db_path, PathBuf::from("/tmp/speed.db"));
    assert_eq!(config.publish_buffer, 64);
    assert_eq!(config.sensor_interval_ms, 250);
    assert_eq!(config.status_port, Some(8080));
    assert!(matches!(config.log_level, LogLevel::Debug));
    assert!(matches!(config.log_format, LogFormat::Json));

    let settings = config.batch_settings();
    assert_eq!(settings.batch_size, 50);
    assert_eq!(settings.batch_timeout, Duration::from_millis(500));
    assert_eq!(settings.max_retries, 5);
    assert_eq!(settings.retry_delay, Duration::from_millis(100));
    assert_eq!(settings.prefetch_multiplier, 3);
    assert_eq!(settings.max_buffer_multiple, Some(2));
}

#[test]
fn test_rejects_unknown_log_level() {
    assert!(parse(&["--log-level", "verbose"]).is_err());
}

#[test]
fn test_rejects_non_numeric_batch_size() {
    assert!(parse(&["--batch-size", "ten"]).is_err());
    assert!(parse(&["--batch-size", "-1"]).is_err());
}

#[test]
fn test_validate_rejects_zero_values() {
    for args in [
        ["--batch-size", "0"],
        ["--batch-timeout-ms", "0"],
        ["--prefetch-multiplier", "0"],
        ["--max-buffer-multiple", "0"],
        ["--queue-name", " "],
    ] {
        let config = parse(&args).unwrap();
        assert!(config.validate().is_err(), "{:?} should be rejected", args);
    }
}

#[test]
fn test_zero_retries_is_valid() {
    let config = parse(&["--max-retries", "0"]).unwrap();
    assert!(config.validate().is_ok());
}
