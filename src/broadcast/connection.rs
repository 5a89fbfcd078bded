//! A single dashboard connection and its write lock

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

/// Connection ID (unique per WebSocket connection)
pub type ConnectionId = Uuid;

/// Type-erased outbound half of a WebSocket
pub type BoxSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// An open log stream.
///
/// The sink lives behind an async mutex which is the connection's write lock:
/// every frame written to this client (events, pings, pongs) goes through it.
pub struct Connection {
    id: ConnectionId,
    sink: Mutex<BoxSink>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
}

impl Connection {
    pub fn new<S>(sink: S) -> Arc<Self>
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        let (close_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4(),
            sink: Mutex::new(Box::pin(sink)),
            closed: AtomicBool::new(false),
            close_tx,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Subscribe to the close signal
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    /// Acquire the write lock
    pub(crate) async fn lock(&self) -> MutexGuard<'_, BoxSink> {
        self.sink.lock().await
    }

    /// Flip the connection into the closed state.
    ///
    /// Returns `true` only for the first caller; that caller owns closing the sink.
    pub(crate) fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.close_tx.send_replace(true);
        true
    }

    /// Close the underlying sink, waiting at most `limit` for the write lock and the close frame
    pub(crate) async fn close_sink(&self, limit: Duration) {
        let result = timeout(limit, async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(connection_id = %self.id, "Connection closed"),
            Ok(Err(e)) => debug!(connection_id = %self.id, "Error closing connection: {}", e),
            Err(_) => debug!(connection_id = %self.id, "Timed out closing connection"),
        }
    }

    /// Mark closed and close the sink; later calls are no-ops
    pub async fn close(&self, limit: Duration) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.close_sink(limit).await;
        true
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
