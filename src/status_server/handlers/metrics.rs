//! Prometheus metrics handler.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error_handling::InfoType;

use super::super::types::StatusState;

/// Prometheus-compatible metrics endpoint
pub async fn metrics_handler(State(state): State<StatusState>) -> Response {
    let stats = &state.stats;

    let metrics = format!(
        r#"# HELP reading_ingest_readings_published_total Readings published to the queue
# TYPE reading_ingest_readings_published_total counter
reading_ingest_readings_published_total {}

# HELP reading_ingest_readings_committed_total Readings written to the store and acknowledged
# TYPE reading_ingest_readings_committed_total counter
reading_ingest_readings_committed_total {}

# HELP reading_ingest_readings_rejected_total Readings rejected after retries were exhausted
# TYPE reading_ingest_readings_rejected_total counter
reading_ingest_readings_rejected_total {}

# HELP reading_ingest_readings_buffered Readings waiting in the consumer buffer
# TYPE reading_ingest_readings_buffered gauge
reading_ingest_readings_buffered {}

# HELP reading_ingest_batches_committed_total Batches committed
# TYPE reading_ingest_batches_committed_total counter
reading_ingest_batches_committed_total {}

# HELP reading_ingest_batch_retries_total Commit attempts that were retried
# TYPE reading_ingest_batch_retries_total counter
reading_ingest_batch_retries_total {}

# HELP reading_ingest_errors_total Total number of errors encountered
# TYPE reading_ingest_errors_total counter
reading_ingest_errors_total {}

# HELP reading_ingest_warnings_total Total number of warnings encountered
# TYPE reading_ingest_warnings_total counter
reading_ingest_warnings_total {}
"#,
        stats.readings_published(),
        stats.readings_committed(),
        stats.readings_rejected(),
        stats.buffered(),
        stats.get_info_count(InfoType::BatchCommitted),
        stats.get_info_count(InfoType::BatchRetried),
        stats.total_errors(),
        stats.total_warnings(),
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response()
}
