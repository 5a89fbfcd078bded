//! Single consumer of the publish channel
//!
//! Each event is fanned out to a snapshot of the registry as a group of write
//! tasks, and the whole group is joined before the next event is taken. This
//! keeps every client on the same global order; a slow client delays the next
//! event for everyone by at most its write deadline (or the optional fan-out
//! timeout).

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::connection::ConnectionId;
use super::registry::ConnectionRegistry;
use super::stats::BroadcastStats;
use super::writer::{self, WriteError};
use crate::models::LogEvent;

/// Outcome of one write task
type WriteOutcome = (ConnectionId, Result<(), WriteError>);

pub struct Dispatcher {
    rx: mpsc::Receiver<Arc<LogEvent>>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<BroadcastStats>,
    write_timeout: Duration,
    fanout_timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) fn new(
        rx: mpsc::Receiver<Arc<LogEvent>>,
        registry: Arc<ConnectionRegistry>,
        stats: Arc<BroadcastStats>,
        write_timeout: Duration,
        fanout_timeout: Option<Duration>,
    ) -> Self {
        Self {
            rx,
            registry,
            stats,
            write_timeout,
            fanout_timeout,
        }
    }

    /// Run the dispatcher (call in a spawned task).
    ///
    /// Returns when shutdown is signalled or every publisher is gone; all
    /// remaining connections are closed on the way out.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting log dispatcher");

        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event).await,
                        None => {
                            debug!("Publish channel closed");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Log dispatcher shutting down");
                        break;
                    }
                }
            }
        }

        self.registry.close_all().await;
        info!("Log dispatcher stopped");
    }

    /// Deliver one event to every registered connection and wait for all writes
    pub(crate) async fn dispatch(&self, event: Arc<LogEvent>) {
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return;
        }

        let json = match serde_json::to_string(&*event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize log event: {}", e);
                return;
            }
        };

        let mut outstanding: HashSet<ConnectionId> = HashSet::with_capacity(targets.len());
        let mut tasks = JoinSet::new();

        for conn in targets {
            outstanding.insert(conn.id());
            let frame = Message::Text(json.clone());
            let deadline = self.write_timeout;

            tasks.spawn(async move {
                let id = conn.id();
                // A panicking write only takes down its own connection
                let result = AssertUnwindSafe(writer::write_frame(&conn, frame, deadline))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(WriteError::Transport("write task panicked".into())));
                (id, result)
            });
        }

        let mut failed = Vec::new();
        let joined = match self.fanout_timeout {
            Some(limit) => timeout(
                limit,
                Self::join_writes(&mut tasks, &mut outstanding, &mut failed, &self.stats),
            )
            .await
            .is_ok(),
            None => {
                Self::join_writes(&mut tasks, &mut outstanding, &mut failed, &self.stats).await;
                true
            }
        };

        if !joined {
            warn!(
                "Fan-out exceeded {:?}, dropping {} slow connections",
                self.fanout_timeout.unwrap_or_default(),
                outstanding.len()
            );
            tasks.abort_all();
        }

        // Anything still outstanding never reported success
        for id in outstanding.drain() {
            self.stats.inc_write_failures();
            failed.push(id);
        }

        for id in failed {
            self.registry.deregister(id).await;
        }
    }

    async fn join_writes(
        tasks: &mut JoinSet<WriteOutcome>,
        outstanding: &mut HashSet<ConnectionId>,
        failed: &mut Vec<ConnectionId>,
        stats: &BroadcastStats,
    ) {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    outstanding.remove(&id);
                    stats.inc_delivered();
                }
                Ok((id, Err(e))) => {
                    outstanding.remove(&id);
                    stats.inc_write_failures();
                    warn!(connection_id = %id, "Log stream write failed: {}", e);
                    failed.push(id);
                }
                Err(e) => {
                    error!("Log stream write task failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::connection::Connection;
    use crate::broadcast::testing::{broken_sink, decode_event, drain, recording_sink, stalled_sink};
    use crate::models::LogLevel;
    use futures::StreamExt;

    fn dispatcher(
        write_timeout: Duration,
        fanout_timeout: Option<Duration>,
    ) -> (Dispatcher, Arc<ConnectionRegistry>, mpsc::Sender<Arc<LogEvent>>) {
        let stats = Arc::new(BroadcastStats::new());
        let registry = Arc::new(ConnectionRegistry::new(stats.clone(), Duration::from_secs(1)));
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(rx, registry.clone(), stats, write_timeout, fanout_timeout);
        (dispatcher, registry, tx)
    }

    fn event(n: usize) -> Arc<LogEvent> {
        Arc::new(LogEvent::new(LogLevel::Info, format!("event {}", n), "test"))
    }

    #[tokio::test]
    async fn test_dispatch_preserves_order_across_connections() {
        let (dispatcher, registry, _tx) = dispatcher(Duration::from_secs(1), None);
        let (sink_a, mut rx_a) = recording_sink();
        let (sink_b, mut rx_b) = recording_sink();
        registry.register(Connection::new(sink_a)).unwrap();
        registry.register(Connection::new(sink_b)).unwrap();

        for n in 0..20 {
            dispatcher.dispatch(event(n)).await;
        }

        let messages = |frames: Vec<Message>| -> Vec<String> {
            frames
                .iter()
                .filter_map(decode_event)
                .map(|e| e.message)
                .collect()
        };
        let a = messages(drain(&mut rx_a));
        let b = messages(drain(&mut rx_b));

        let expected: Vec<String> = (0..20).map(|n| format!("event {}", n)).collect();
        assert_eq!(a, expected);
        assert_eq!(b, expected);
    }

    #[tokio::test]
    async fn test_slow_connection_is_removed_and_others_continue() {
        let (dispatcher, registry, _tx) = dispatcher(Duration::from_millis(50), None);
        let (sink, mut rx) = recording_sink();
        let healthy = registry.register(Connection::new(sink)).unwrap();
        let slow = registry.register(Connection::new(stalled_sink())).unwrap();

        dispatcher.dispatch(event(1)).await;

        assert!(!registry.contains(slow.id()));
        assert!(slow.is_closed());
        assert!(registry.contains(healthy.id()));

        dispatcher.dispatch(event(2)).await;

        let received: Vec<_> = drain(&mut rx).iter().filter_map(decode_event).collect();
        assert_eq!(received.len(), 2);
        assert_eq!(dispatcher.stats.snapshot().write_failures, 1);
    }

    #[tokio::test]
    async fn test_broken_connection_is_removed() {
        let (dispatcher, registry, _tx) = dispatcher(Duration::from_secs(1), None);
        let broken = registry.register(Connection::new(broken_sink())).unwrap();

        dispatcher.dispatch(event(1)).await;

        assert!(!registry.contains(broken.id()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_timeout_drops_outstanding_writers() {
        let (dispatcher, registry, _tx) =
            dispatcher(Duration::from_secs(30), Some(Duration::from_millis(50)));
        let (sink, mut rx) = recording_sink();
        let healthy = registry.register(Connection::new(sink)).unwrap();
        let slow = registry.register(Connection::new(stalled_sink())).unwrap();

        let started = tokio::time::Instant::now();
        dispatcher.dispatch(event(1)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!registry.contains(slow.id()));
        assert!(registry.contains(healthy.id()));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_run_delivers_until_shutdown() {
        let (dispatcher, registry, tx) = dispatcher(Duration::from_secs(1), None);
        let (sink, mut rx) = recording_sink();
        let conn = registry.register(Connection::new(sink)).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(dispatcher.run(shutdown_rx));

        tx.send(event(1)).await.unwrap();
        let frame = rx.next().await.unwrap();
        assert_eq!(decode_event(&frame).unwrap().message, "event 1");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(registry.is_empty());
        assert!(conn.is_closed());
    }
}
