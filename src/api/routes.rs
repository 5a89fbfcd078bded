//! API route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        .nest("/api", log_routes())
        .with_state(state)
}

/// Log ingest and streaming
fn log_routes() -> Router<AppState> {
    Router::new()
        .route("/logs", post(handlers::logs::publish_log))
        // WebSocket endpoints
        .route("/ws/logs", get(websocket::logs::logs_ws))
}
