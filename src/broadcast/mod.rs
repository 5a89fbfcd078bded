//! Real-time log broadcast
//!
//! Producers hand events to [`LogBroadcaster::publish`], a bounded channel
//! feeds the single [`Dispatcher`], and the dispatcher fans each event out to
//! every registered connection through that connection's write lock.
//!
//! Backpressure is shed at the producer side: when the channel stays full for
//! longer than the publish timeout the event is dropped and counted, so request
//! handlers and jobs never stall on slow dashboards.

mod connection;
mod dispatcher;
mod liveness;
mod registry;
mod stats;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{BoxSink, Connection, ConnectionId};
pub use dispatcher::Dispatcher;
pub use liveness::{monitor, Termination};
pub use registry::ConnectionRegistry;
pub use stats::{BroadcastStats, BroadcastStatsSnapshot};
pub use writer::{send_json, send_ping, write_event, write_frame, WriteError};

use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::BroadcastConfig;
use crate::models::{LogEvent, LogLevel};
use crate::snapshot::SnapshotReader;

/// What happened to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Accepted into the publish channel
    Queued,
    /// Nobody is listening; the channel was not touched
    NoSubscribers,
    /// Channel stayed full past the publish timeout
    Dropped,
    /// Dispatcher is gone
    Closed,
}

/// Producer-facing handle to the broadcast pipeline. Cheap to clone.
#[derive(Clone)]
pub struct LogBroadcaster {
    tx: mpsc::Sender<Arc<LogEvent>>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<BroadcastStats>,
    snapshot: Arc<SnapshotReader>,
    config: BroadcastConfig,
}

impl LogBroadcaster {
    /// Create the broadcaster and its dispatcher. The dispatcher must be run
    /// (usually in a spawned task) for events to flow.
    pub fn new(config: BroadcastConfig, snapshot: SnapshotReader) -> (Self, Dispatcher) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let stats = Arc::new(BroadcastStats::new());
        let registry = Arc::new(ConnectionRegistry::new(
            stats.clone(),
            config.write_timeout,
        ));

        let dispatcher = Dispatcher::new(
            rx,
            registry.clone(),
            stats.clone(),
            config.write_timeout,
            config.fanout_timeout,
        );

        let broadcaster = Self {
            tx,
            registry,
            stats,
            snapshot: Arc::new(snapshot),
            config,
        };

        (broadcaster, dispatcher)
    }

    /// Publish an event to every connected client.
    ///
    /// Waits at most the configured publish timeout for channel space, then
    /// drops the event.
    pub async fn publish(&self, event: LogEvent) -> PublishOutcome {
        if self.registry.is_empty() {
            return PublishOutcome::NoSubscribers;
        }

        let event = match self.tx.try_send(Arc::new(event)) {
            Ok(()) => return self.queued(),
            Err(mpsc::error::TrySendError::Closed(_)) => return PublishOutcome::Closed,
            Err(mpsc::error::TrySendError::Full(event)) => event,
        };

        match self.tx.send_timeout(event, self.config.publish_timeout).await {
            Ok(()) => self.queued(),
            Err(mpsc::error::SendTimeoutError::Timeout(event)) => {
                self.dropped(&event);
                PublishOutcome::Dropped
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => PublishOutcome::Closed,
        }
    }

    /// Fire-and-forget publish of a level/message/source triple
    pub async fn publish_log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> PublishOutcome {
        self.publish(LogEvent::new(level, message, source)).await
    }

    /// Non-waiting publish for callers outside an async context
    pub fn try_publish(&self, event: LogEvent) -> PublishOutcome {
        if self.registry.is_empty() {
            return PublishOutcome::NoSubscribers;
        }

        match self.tx.try_send(Arc::new(event)) {
            Ok(()) => self.queued(),
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped(&event);
                PublishOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PublishOutcome::Closed,
        }
    }

    fn queued(&self) -> PublishOutcome {
        self.stats.inc_published();
        PublishOutcome::Queued
    }

    fn dropped(&self, event: &LogEvent) {
        self.stats.inc_dropped();
        warn!(
            level = %event.level,
            source = %event.source,
            dropped_total = self.stats.dropped(),
            "Log broadcast channel full, dropping event"
        );
    }

    /// Drive one client connection from catch-up to teardown.
    ///
    /// The snapshot is written before the connection joins the registry, so
    /// the client sees historical lines strictly before any live event.
    pub async fn serve<S, R>(&self, sink: S, inbound: R)
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
        R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let conn = Connection::new(sink);
        info!(connection_id = %conn.id(), "Log stream connected");

        for event in self.snapshot.load().await {
            if let Err(e) = write_event(&conn, &event, self.config.write_timeout).await {
                warn!(connection_id = %conn.id(), "Failed to send log snapshot: {}", e);
                conn.close(self.config.write_timeout).await;
                return;
            }
        }

        if self.registry.register(conn.clone()).is_none() {
            debug!(connection_id = %conn.id(), "Connection refused by registry");
            conn.close(self.config.write_timeout).await;
            return;
        }

        let reason = monitor(&conn, inbound, &self.config).await;
        self.registry.deregister(conn.id()).await;

        info!(connection_id = %conn.id(), "Log stream disconnected: {}", reason);
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> BroadcastStatsSnapshot {
        self.stats.snapshot()
    }

    /// Events waiting in the publish channel
    pub fn queued_events(&self) -> usize {
        self.config.channel_capacity - self.tx.capacity()
    }
}

/// Handle for stopping the dispatcher
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl DispatcherHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for DispatcherHandle {
    fn default() -> Self {
        Self::new().0
    }
}
