//! Broadcast counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the publisher, dispatcher and registry
#[derive(Debug, Default)]
pub struct BroadcastStats {
    /// Events accepted into the publish channel
    published: AtomicU64,
    /// Events shed because the channel stayed full
    dropped: AtomicU64,
    /// Successful per-connection writes
    delivered: AtomicU64,
    /// Failed per-connection writes
    write_failures: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Get snapshot for API
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);

        BroadcastStatsSnapshot {
            published: self.published(),
            dropped: self.dropped(),
            delivered: self.delivered.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            connections_opened: opened,
            connections_closed: closed,
            active_connections: opened.saturating_sub(closed),
        }
    }
}

/// Serializable view of [`BroadcastStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub published: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub write_failures: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub active_connections: u64,
}
