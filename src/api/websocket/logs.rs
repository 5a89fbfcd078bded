//! Logs WebSocket handler
//!
//! Provides real-time log streaming. Each client first receives the catch-up
//! snapshot, then every event published while it stays connected.

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::StreamExt;

use crate::api::server::AppState;

/// WebSocket handler for log streaming
pub async fn logs_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_logs_ws(socket, state))
}

/// Handle WebSocket connection for logs
async fn handle_logs_ws(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    state.broadcaster.serve(sender, receiver).await;
}
