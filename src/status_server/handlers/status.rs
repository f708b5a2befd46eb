//! JSON status and liveness handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::super::types::StatusState;

/// Liveness check
pub async fn root_handler() -> &'static str {
    "Reading ingest service running"
}

/// JSON status endpoint with consumer counters
pub async fn status_handler(State(state): State<StatusState>) -> Response {
    (StatusCode::OK, Json(state.snapshot())).into_response()
}
