//! Health and status endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "logcast"
        })),
    )
}

/// Broadcast status: uptime, live connections and pipeline counters
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let broadcaster = &state.broadcaster;

    Json(json!({
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "connections": broadcaster.connection_count(),
        "queued_events": broadcaster.queued_events(),
        "broadcast": broadcaster.stats(),
    }))
}
