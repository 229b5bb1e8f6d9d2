/// CONNECT tunnel negotiation
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::sink::{ConnectionRecord, EventSink, Protocol};

use super::pump;

/// Exact bytes a client expects before it starts speaking TLS through us
const ESTABLISHED_RESPONSE: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

/// Negotiate a CONNECT tunnel and pump bytes until both directions finish
pub(super) async fn handle_tunnel(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    first_line: &str,
    config: &ProxyConfig,
    sink: &Arc<dyn EventSink>,
) -> Result<()> {
    let (host, port) = parse_connect_target(first_line)?;

    // Emitted before the dial on purpose: the record reflects an accepted
    // tunnel request, not a guaranteed successful tunnel.
    sink.on_record(ConnectionRecord::new(
        peer_addr.ip().to_string(),
        &host,
        "CONNECT",
        Protocol::Https,
    ));

    let addr = format!("{}:{}", host, port);
    let upstream = TcpStream::connect(&addr)
        .await
        .map_err(|e| ProxyError::connection_failed(&addr, e))?;
    // On dial failure the client gets no response at all, just a drop.

    client.write_all(ESTABLISHED_RESPONSE).await?;

    info!("Tunnel established: {} <-> {}", peer_addr, addr);
    pump::pump(client, upstream, config.buffer_size, sink).await;
    info!("Tunnel closed: {} <-> {}", peer_addr, addr);

    Ok(())
}

/// Parse `host:port` from the second token of a CONNECT request line
fn parse_connect_target(first_line: &str) -> Result<(String, u16)> {
    let target = first_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ProxyError::parse(format!("missing target in '{}'", first_line.trim())))?;

    let (host, port_str) = target
        .split_once(':')
        .ok_or_else(|| ProxyError::parse(format!("missing port in CONNECT target '{}'", target)))?;

    let port: u16 = port_str
        .parse()
        .map_err(|_| ProxyError::parse(format!("invalid port in CONNECT target '{}'", target)))?;

    Ok((host.to_string(), port))
}
