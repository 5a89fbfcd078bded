//! Live connection registry
//!
//! Holds every connection that should receive live events. The map lock is only
//! held to insert, remove or clone the current set; writes happen on the
//! snapshot, never under the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;

use super::connection::{Connection, ConnectionId};
use super::stats::BroadcastStats;

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    /// Set under the map lock by `close_all`; no registrations after that
    shutting_down: AtomicBool,
    stats: Arc<BroadcastStats>,
    close_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(stats: Arc<BroadcastStats>, close_timeout: Duration) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            stats,
            close_timeout,
        }
    }

    /// Add a connection to the live set.
    ///
    /// Returns `None` if the connection was already closed or the registry is
    /// shutting down. The caller owns closing a refused connection.
    pub fn register(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let mut connections = self.connections.lock();
        if self.shutting_down.load(Ordering::Acquire) || conn.is_closed() {
            return None;
        }
        if connections.insert(conn.id(), conn.clone()).is_none() {
            self.stats.connection_opened();
        }
        debug!(
            connection_id = %conn.id(),
            active = connections.len(),
            "Connection registered"
        );
        Some(conn)
    }

    /// Remove a connection and close its transport.
    ///
    /// Idempotent: only the call that actually removes the entry closes the
    /// transport. Returns whether this call removed it.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut connections = self.connections.lock();
            connections.remove(&id).map(|conn| {
                // Marked under the lock so a concurrent register sees it closed
                let owns_close = conn.mark_closed();
                (conn, owns_close)
            })
        };

        match removed {
            Some((conn, owns_close)) => {
                self.stats.connection_closed();
                debug!(connection_id = %id, "Connection deregistered");
                if owns_close {
                    conn.close_sink(self.close_timeout).await;
                }
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the live set
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Deregister and close every connection, refusing any later registration
    pub async fn close_all(&self) {
        let ids: Vec<ConnectionId> = {
            let connections = self.connections.lock();
            self.shutting_down.store(true, Ordering::Release);
            connections.keys().copied().collect()
        };
        if ids.is_empty() {
            return;
        }
        debug!("Closing {} connections", ids.len());
        join_all(ids.into_iter().map(|id| self.deregister(id))).await;
    }
}
