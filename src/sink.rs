/// Event sink contract
///
/// The engine reports stats, log lines and connection records through this
/// trait and knows nothing about how they are rendered. A UI front-end, a
/// log file or a test harness all plug in the same way. Implementations
/// must tolerate concurrent calls from many connection handlers; only
/// per-connection ordering is guaranteed (the record for a connection is
/// emitted before its forwarding starts), never a global order.
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Protocol of a proxied connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the connection table, immutable once emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Wall-clock time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    /// Client IP address
    pub client_ip: String,
    /// Target host the client asked for
    pub target_host: String,
    /// Status label ("CONNECT" for tunnels, "Connected" for plain HTTP)
    pub status: String,
    /// HTTP or HTTPS
    pub protocol: Protocol,
}

impl ConnectionRecord {
    /// Create a record stamped with the current local time
    pub fn new(
        client_ip: impl Into<String>,
        target_host: impl Into<String>,
        status: impl Into<String>,
        protocol: Protocol,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            client_ip: client_ip.into(),
            target_host: target_host.into(),
            status: status.into(),
            protocol,
        }
    }
}

/// Consumer of engine notifications
///
/// All three callbacks may be invoked concurrently from different
/// connection handlers.
pub trait EventSink: Send + Sync {
    /// Counter update: currently active connections and total requests
    fn on_stats(&self, active: u64, total: u64);

    /// Free-form log line
    fn on_log(&self, message: &str);

    /// A classified connection
    fn on_record(&self, record: ConnectionRecord);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_stats(&self, _active: u64, _total: u64) {}
    fn on_log(&self, _message: &str) {}
    fn on_record(&self, _record: ConnectionRecord) {}
}

/// Sink that forwards everything to `tracing`
///
/// Used by the standalone binary, which has no UI to feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_stats(&self, active: u64, total: u64) {
        info!("Connections: {} active, {} total", active, total);
    }

    fn on_log(&self, message: &str) {
        info!("{}", message);
    }

    fn on_record(&self, record: ConnectionRecord) {
        info!(
            "{} {} -> {} [{}] {}",
            record.timestamp, record.client_ip, record.target_host, record.status, record.protocol
        );
    }
}
