//! Serialized, deadline-bounded writes to a single connection

use std::time::Duration;

use axum::extract::ws::Message;
use futures::SinkExt;
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;

use super::connection::Connection;
use crate::models::LogEvent;

/// Failure writing to one connection. The connection must be treated as dead.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}

/// Encode `event` as one JSON text frame and write it
pub async fn write_event(
    conn: &Connection,
    event: &LogEvent,
    deadline: Duration,
) -> Result<(), WriteError> {
    send_json(conn, event, deadline).await
}

/// Encode any payload as a JSON text frame and write it
pub async fn send_json<T: Serialize>(
    conn: &Connection,
    payload: &T,
    deadline: Duration,
) -> Result<(), WriteError> {
    let json = serde_json::to_string(payload)?;
    write_frame(conn, Message::Text(json), deadline).await
}

/// Transport-level keep-alive ping
pub async fn send_ping(conn: &Connection, deadline: Duration) -> Result<(), WriteError> {
    write_frame(conn, Message::Ping(Vec::new()), deadline).await
}

/// Write one frame while holding the connection's write lock.
///
/// The deadline starts once the lock is held, so it bounds the transport
/// write itself.
pub async fn write_frame(
    conn: &Connection,
    frame: Message,
    deadline: Duration,
) -> Result<(), WriteError> {
    if conn.is_closed() {
        return Err(WriteError::Closed);
    }

    let mut sink = conn.lock().await;
    if conn.is_closed() {
        return Err(WriteError::Closed);
    }

    match timeout(deadline, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteError::Transport(e.to_string())),
        Err(_) => Err(WriteError::Timeout(deadline)),
    }
}
