//! Logger initialization.

use std::io::Write;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;
use colored::*;
use log::{Level, LevelFilter};

/// Installs the process logger.
///
/// `level` applies to this crate and everything not listed below; sqlx is held
/// at warn since it logs each batch insert at info. `RUST_LOG` is read first,
/// so it still controls modules the level does not cover.
///
/// # Errors
///
/// `InitializationError::LoggerError` if a logger is already installed.
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    colored::control::set_override(true);

    let mut builder = env_logger::Builder::from_default_env();
    builder
        .filter_level(level)
        .filter_module("sqlx", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Info)
        .filter_module("reading_ingest", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = json_line(
                    chrono::Utc::now().timestamp_millis(),
                    record.level(),
                    record.target(),
                    &record.args().to_string(),
                );
                writeln!(buf, "{}", line)
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}",
                    record.target().cyan(),
                    colored_level(record.level()),
                    record.args()
                )
            });
        }
    }

    builder.try_init().map_err(InitializationError::from)
}

/// One log record as a single-line JSON object.
fn json_line(ts_ms: i64, level: Level, target: &str, msg: &str) -> String {
    serde_json::json!({
        "ts": ts_ms,
        "level": level.as_str(),
        "target": target,
        "msg": msg,
    })
    .to_string()
}

fn colored_level(level: Level) -> ColoredString {
    let label = level.as_str();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_escapes_message() {
        let line = json_line(
            1_700_000_000_000,
            Level::Warn,
            "reading_ingest::ingest",
            "batch of 3 \"retried\"\nagain",
        );
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["ts"], 1_700_000_000_000i64);
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["target"], "reading_ingest::ingest");
        assert_eq!(parsed["msg"], "batch of 3 \"retried\"\nagain");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_init_logger_only_once_per_process() {
        // Whichever call comes first wins; the second always fails
        let _ = init_logger_with(LevelFilter::Debug, LogFormat::Json);
        let second = init_logger_with(LevelFilter::Info, LogFormat::Plain);
        assert!(matches!(second, Err(InitializationError::LoggerError(_))));
    }
}
