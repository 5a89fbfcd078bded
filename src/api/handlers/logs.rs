//! Log ingest handler
//!
//! Lets other services in the deployment push events onto the live stream.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::api::server::AppState;
use crate::broadcast::PublishOutcome;
use crate::error::LogcastError;
use crate::models::{LogLevel, PublishLogRequest};

const DEFAULT_SOURCE: &str = "api";

/// Publish one log event to connected dashboards
pub async fn publish_log(
    State(state): State<AppState>,
    Json(req): Json<PublishLogRequest>,
) -> Result<impl IntoResponse, LogcastError> {
    let level =
        LogLevel::from_str(&req.level).ok_or_else(|| LogcastError::InvalidLevel(req.level.clone()))?;

    if req.message.trim().is_empty() {
        return Err(LogcastError::InvalidRequest("message must not be empty".into()));
    }

    let source = req
        .source
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let outcome = state
        .broadcaster
        .publish_log(level, req.message, source)
        .await;
    if outcome == PublishOutcome::Closed {
        return Err(LogcastError::ChannelClosed);
    }
    debug!("Ingested log event: {:?}", outcome);

    Ok((StatusCode::ACCEPTED, Json(json!({ "outcome": outcome }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::ApiServer;
    use crate::broadcast::testing::recording_sink;
    use crate::broadcast::{Connection, Dispatcher, LogBroadcaster};
    use crate::config::{ApiServerConfig, BroadcastConfig};
    use crate::snapshot::SnapshotReader;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    fn broadcaster() -> (LogBroadcaster, Dispatcher) {
        LogBroadcaster::new(
            BroadcastConfig::default(),
            SnapshotReader::new("/nonexistent/logcast/app.log", 20),
        )
    }

    fn server() -> ApiServer {
        with_broadcaster(broadcaster().0)
    }

    fn with_broadcaster(broadcaster: LogBroadcaster) -> ApiServer {
        ApiServer::new(
            ApiServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_origins: vec![],
            },
            broadcaster,
        )
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/logs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_publish_accepts_valid_event() {
        let app = server().build_router();

        let response = app
            .oneshot(post(r#"{"level":"warn","message":"disk almost full","source":"monitor"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["outcome"], "no_subscribers");
    }

    #[tokio::test]
    async fn test_publish_rejects_unknown_level() {
        let app = server().build_router();

        let response = app
            .oneshot(post(r#"{"level":"loud","message":"hello"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid log level: loud");
    }

    #[tokio::test]
    async fn test_publish_after_dispatcher_stopped_is_unavailable() {
        let (broadcaster, dispatcher) = broadcaster();
        let (sink, _rx) = recording_sink();
        broadcaster.registry().register(Connection::new(sink)).unwrap();
        drop(dispatcher);
        let app = with_broadcaster(broadcaster).build_router();

        let response = app
            .oneshot(post(r#"{"level":"error","message":"nobody home"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Broadcast channel closed");
    }

    #[tokio::test]
    async fn test_publish_rejects_empty_message() {
        let app = server().build_router();

        let response = app
            .oneshot(post(r#"{"level":"info","message":"   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_reports_counters() {
        let app = server().build_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["connections"], 0);
        assert_eq!(body["broadcast"]["dropped"], 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = server().build_router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["service"], "logcast");
    }
}
