/// Forward HTTP/HTTPS proxy engine
///
/// The engine accepts client connections, classifies CONNECT tunnels vs.
/// plain HTTP requests, and relays bytes to the requested upstream. All
/// observability (counters, log lines, connection records) goes through
/// the [`EventSink`] trait so any front-end can consume it.
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod sink;
pub mod stats;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use server::{ProxyServer, ServerHandle};
pub use sink::{ConnectionRecord, EventSink, LogSink, NoopSink, Protocol};
pub use stats::{ServerStats, StatsSnapshot};
