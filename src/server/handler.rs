/// Per-connection entry point and request classification
///
/// One initial read decides everything: a leading `CONNECT` token routes to
/// the tunnel handler, anything else to the plain-HTTP forwarder. This is
/// also the error bulkhead: no failure below this point reaches the accept
/// loop or any other connection.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::sink::EventSink;
use crate::stats::{ConnectionGuard, ServerStats};

use super::{forward, tunnel};

pub(super) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ProxyConfig>,
    stats: ServerStats,
    sink: Arc<dyn EventSink>,
) {
    // Dropped on every exit path, so the active count goes down exactly once
    let _guard = ConnectionGuard::new(stats, Arc::clone(&sink));

    if let Err(e) = serve_connection(stream, peer_addr, &config, &sink).await {
        error!("Error handling client {}: {}", peer_addr, e);
        sink.on_log(&format!("Error handling client {}: {}", peer_addr, e));
    }
}

async fn serve_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    config: &ProxyConfig,
    sink: &Arc<dyn EventSink>,
) -> Result<()> {
    // The sole initial read; request data beyond it never reaches upstream
    let mut buf = vec![0u8; config.buffer_size];
    let n = client.read(&mut buf).await?;
    if n == 0 {
        // Peer closed before sending anything: no record, no forwarding
        debug!("Client {} closed without sending data", peer_addr);
        return Ok(());
    }
    buf.truncate(n);

    let line = first_line(&buf);
    match request_method(&line) {
        "CONNECT" => tunnel::handle_tunnel(client, peer_addr, &line, config, sink).await,
        _ => forward::handle_forward(client, peer_addr, &buf, &line, config, sink).await,
    }
}

/// First request line, without any further validation
fn first_line(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .split('\n')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Leading token of the request line
fn request_method(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or_default()
}
