//! Per-connection keep-alive and inbound frame handling

use std::fmt;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::connection::Connection;
use super::writer::{self, WriteError};
use crate::config::BroadcastConfig;
use crate::models::{ControlMessage, ControlReply};

/// Why a connection's monitor stopped
#[derive(Debug)]
pub enum Termination {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// Reading from the transport failed
    ReadError(String),
    /// Keep-alive ping could not be written
    PingFailed(WriteError),
    /// Application-level pong could not be written
    ReplyFailed(WriteError),
    /// Connection was closed elsewhere (write failure, shutdown)
    Closed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::ClientClosed => write!(f, "client closed"),
            Termination::ReadError(e) => write!(f, "read error: {}", e),
            Termination::PingFailed(e) => write!(f, "ping failed: {}", e),
            Termination::ReplyFailed(e) => write!(f, "pong reply failed: {}", e),
            Termination::Closed => write!(f, "closed by server"),
        }
    }
}

/// Watch one connection until it is gone.
///
/// Drives the read loop and the ping ticker together so that whichever ends
/// first cancels the other. The caller deregisters the connection afterwards.
pub async fn monitor<R>(conn: &Connection, mut inbound: R, config: &BroadcastConfig) -> Termination
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut closed = conn.closed_signal();
    if conn.is_closed() {
        return Termination::Closed;
    }

    let mut ticker = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = inbound.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(ControlMessage::Ping) = ControlMessage::parse(&text) {
                            if let Err(e) =
                                writer::send_json(conn, &ControlReply::pong(), config.write_timeout).await
                            {
                                return Termination::ReplyFailed(e);
                            }
                        } else {
                            debug!(connection_id = %conn.id(), "Ignoring inbound text frame");
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // Pong is handled automatically by axum
                        debug!(connection_id = %conn.id(), "Log stream ping received");
                    }
                    Some(Ok(Message::Close(_))) | None => return Termination::ClientClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Termination::ReadError(e.to_string()),
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = writer::send_ping(conn, config.ping_timeout).await {
                    return Termination::PingFailed(e);
                }
            }
            changed = closed.changed() => {
                if changed.is_err() || *closed.borrow() {
                    return Termination::Closed;
                }
            }
        }
    }
}
