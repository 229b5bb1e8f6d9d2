/// Plain-HTTP request forwarding
///
/// One request/response cycle: the raw initial read goes upstream as-is,
/// the upstream response is relayed back until it closes. Anything past
/// the initial read buffer never reaches upstream, and termination relies
/// on the upstream closing its side, so this only works for non-persistent
/// responses. Both limitations come with the request-line-only design.
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::sink::{ConnectionRecord, EventSink, Protocol};

/// Forward one plain-HTTP request and relay the response back
pub(super) async fn handle_forward(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    raw_request: &[u8],
    first_line: &str,
    config: &ProxyConfig,
    sink: &Arc<dyn EventSink>,
) -> Result<()> {
    let target = first_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ProxyError::parse(format!("missing target in '{}'", first_line.trim())))?;

    let (host, port) = parse_target(target)?;
    let addr = format!("{}:{}", host, port);

    let mut upstream = TcpStream::connect(&addr)
        .await
        .map_err(|e| ProxyError::connection_failed(&addr, e))?;

    sink.on_record(ConnectionRecord::new(
        peer_addr.ip().to_string(),
        &host,
        "Connected",
        Protocol::Http,
    ));
    info!("Forwarding HTTP request from {} to {}", peer_addr, addr);

    // The request exactly as received; only the initial read is ever sent
    upstream.write_all(raw_request).await?;

    // No content-length awareness: relay until the upstream closes
    let mut buf = vec![0u8; config.buffer_size];
    loop {
        let n = upstream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        client.write_all(&buf[..n]).await?;
    }

    info!("HTTP request for {} completed", addr);
    Ok(())
    // Both sockets close here on every path, including the error returns
}

/// Extract host and port from an absolute-URI request target
///
/// Strips an optional `scheme://` prefix; the path boundary is the first
/// `/` (or the end of the string). A colon before the boundary separates
/// host and port, otherwise the port defaults to 80.
fn parse_target(target: &str) -> Result<(String, u16)> {
    let rest = match target.find("://") {
        Some(pos) => &target[pos + 3..],
        None => target,
    };

    let path_pos = rest.find('/').unwrap_or(rest.len());

    match rest.find(':') {
        Some(colon_pos) if colon_pos < path_pos => {
            let host = &rest[..colon_pos];
            let port: u16 = rest[colon_pos + 1..path_pos]
                .parse()
                .map_err(|_| ProxyError::parse(format!("invalid port in target '{}'", target)))?;
            Ok((host.to_string(), port))
        }
        _ => Ok((rest[..path_pos].to_string(), 80)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_default_port() {
        let (host, port) = parse_target("http://example.com/").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[test]
    fn test_parse_target_explicit_port() {
        let (host, port) = parse_target("http://example.com:8000/path").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 8000);
    }

    #[test]
    fn test_parse_target_no_path() {
        let (host, port) = parse_target("http://example.com").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);

        let (host, port) = parse_target("http://example.com:8080").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_parse_target_without_scheme() {
        let (host, port) = parse_target("example.com:3000/index.html").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 3000);

        let (host, port) = parse_target("example.com/index.html").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[test]
    fn test_parse_target_colon_in_path() {
        // Colon after the path boundary belongs to the path, not a port
        let (host, port) = parse_target("http://example.com/a:b").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
    }

    #[test]
    fn test_parse_target_bad_port() {
        assert!(parse_target("http://example.com:abc/").unwrap_err().is_parse());
        assert!(parse_target("http://example.com:/").unwrap_err().is_parse());
        assert!(parse_target("http://example.com:123456/").unwrap_err().is_parse());
    }
}
