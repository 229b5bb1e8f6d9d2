use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::sink::EventSink;

/// Point-in-time view of the listener counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Currently active connections
    pub active_connections: u64,
    /// Total accepted connections, monotonic
    pub total_requests: u64,
}

/// Listener counters, shared by every connection handler
///
/// Mutated from many concurrent handlers, so both counters are atomics.
#[derive(Debug, Clone)]
pub struct ServerStats {
    active_connections: Arc<AtomicU64>,
    total_requests: Arc<AtomicU64>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            active_connections: Arc::new(AtomicU64::new(0)),
            total_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Called once per accepted connection, before its handler is spawned
    pub fn connection_started(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Called exactly once per accepted connection, whatever the outcome
    pub fn connection_ended(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_connections: self.active_connections(),
            total_requests: self.total_requests(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the active count and re-publishes stats
///
/// Held by a connection handler for its whole lifetime so the decrement
/// happens exactly once on every exit path, early returns included.
pub struct ConnectionGuard {
    stats: ServerStats,
    sink: Arc<dyn EventSink>,
}

impl ConnectionGuard {
    pub fn new(stats: ServerStats, sink: Arc<dyn EventSink>) -> Self {
        Self { stats, sink }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.connection_ended();
        self.sink
            .on_stats(self.stats.active_connections(), self.stats.total_requests());
    }
}
