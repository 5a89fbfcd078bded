use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the Logcast service
#[derive(Error, Debug)]
pub enum LogcastError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    // Broadcast errors
    #[error("Broadcast channel closed")]
    ChannelClosed,

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Logcast operations
pub type Result<T> = std::result::Result<T, LogcastError>;

impl LogcastError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            LogcastError::InvalidRequest(_)
            | LogcastError::InvalidLevel(_)
            | LogcastError::InvalidConfig(_)
            | LogcastError::Json(_) => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable
            LogcastError::ChannelClosed => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            LogcastError::Io(_) | LogcastError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for LogcastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
