mod forward;
mod handler;
mod pump;
mod tunnel;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::sink::EventSink;
use crate::stats::{ServerStats, StatsSnapshot};

/// Cloneable handle to a running [`ProxyServer`]
///
/// `stop()` only stops admitting new connections. Handlers that are already
/// forwarding keep running until their peers close, so the process can hold
/// long-lived tunnel sessions after `stop()` returns.
#[derive(Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    stats: ServerStats,
}

impl ServerHandle {
    /// Stop accepting new connections and let in-flight handlers drain
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// Forward proxy listener
///
/// Accepts client connections and spawns one handler task per connection.
/// All observable side effects go through the supplied [`EventSink`].
pub struct ProxyServer {
    config: Arc<ProxyConfig>,
    stats: ServerStats,
    sink: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig, sink: Arc<dyn EventSink>) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        Self {
            config: Arc::new(config),
            stats: ServerStats::new(),
            sink,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Handle for stopping the server and reading counters
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
            shutdown_tx: self.shutdown_tx.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Bind the listening socket and run the accept loop
    ///
    /// Returns after [`ServerHandle::stop`] has been called, or with a
    /// [`ProxyError::Bind`] if the address is unavailable. Accept failures
    /// while running are logged and the loop continues.
    pub async fn run(&self) -> Result<()> {
        let listener = bind_listener(&self.config)?;
        let local_addr = listener.local_addr()?;

        // Subscribe before flipping the flag so a racing stop() cannot
        // send on the channel while nobody listens.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::SeqCst);
        info!("Proxy server listening on {}", local_addr);
        self.sink.on_log(&format!(
            "Server started on {}:{}",
            self.config.bind_host, self.config.bind_port
        ));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            self.accept_connection(stream, peer_addr);
                        }
                        Err(e) => {
                            // Expected exit path once stop() closed the loop
                            if !self.running.load(Ordering::SeqCst) {
                                break;
                            }
                            error!("Failed to accept connection: {}", e);
                            self.sink
                                .on_log(&format!("Error accepting connection: {}", e));
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "Listener on {} stopped, {} connection(s) still draining",
            local_addr,
            self.stats.active_connections()
        );
        self.sink.on_log("Server stopped");
        Ok(())
    }

    /// Local counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn accept_connection(&self, stream: tokio::net::TcpStream, peer_addr: SocketAddr) {
        self.stats.connection_started();
        self.sink
            .on_stats(self.stats.active_connections(), self.stats.total_requests());

        let config = Arc::clone(&self.config);
        let stats = self.stats.clone();
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            handler::handle_connection(stream, peer_addr, config, stats, sink).await;
        });
    }
}

/// Bind with SO_REUSEADDR and the configured backlog
///
/// `TcpListener::bind` exposes neither, hence the socket2 detour.
fn bind_listener(config: &ProxyConfig) -> Result<TcpListener> {
    let bind_addr = config.bind_addr();
    let addr: SocketAddr = bind_addr
        .to_socket_addrs()
        .map_err(|e| ProxyError::bind(&bind_addr, e))?
        .next()
        .ok_or_else(|| {
            ProxyError::bind(
                &bind_addr,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "address did not resolve"),
            )
        })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(SockProtocol::TCP))
        .map_err(|e| ProxyError::bind(&bind_addr, e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ProxyError::bind(&bind_addr, e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| ProxyError::bind(&bind_addr, e))?;
    socket
        .listen(config.backlog as i32)
        .map_err(|e| ProxyError::bind(&bind_addr, e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ProxyError::bind(&bind_addr, e))?;

    TcpListener::from_std(socket.into()).map_err(|e| ProxyError::bind(&bind_addr, e))
}
