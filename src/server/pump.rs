/// Bidirectional byte relay for tunnel sessions
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::sink::EventSink;

/// Relay bytes in both directions until both flows have terminated
///
/// join! rather than select!: a half-closed session stays open until the
/// second direction also sees EOF or an error. Both sockets are closed
/// here, exactly once, when the halves are dropped.
pub(super) async fn pump(
    client: TcpStream,
    upstream: TcpStream,
    buffer_size: usize,
    sink: &Arc<dyn EventSink>,
) {
    let (mut client_read, mut client_write) = client.into_split();
    let (mut upstream_read, mut upstream_write) = upstream.into_split();

    let client_to_upstream = relay(
        &mut client_read,
        &mut upstream_write,
        buffer_size,
        "client -> upstream",
        sink,
    );
    let upstream_to_client = relay(
        &mut upstream_read,
        &mut client_write,
        buffer_size,
        "upstream -> client",
        sink,
    );

    let (sent, received) = tokio::join!(client_to_upstream, upstream_to_client);
    debug!("Tunnel finished: {} bytes up, {} bytes down", sent, received);
}

/// One relay flow: read up to `buffer_size` bytes, write them unmodified
///
/// Terminates on a zero-length read (graceful peer close) or any I/O error
/// (logged, not retried). EOF does not shut the peer's write half down; the
/// other flow decides its own fate.
async fn relay<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    direction: &str,
    sink: &Arc<dyn EventSink>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    warn!("Tunneling error ({}): {}", direction, e);
                    sink.on_log(&format!("Tunneling error ({}): {}", direction, e));
                    break;
                }
                total += n as u64;
            }
            Err(e) => {
                warn!("Tunneling error ({}): {}", direction, e);
                sink.on_log(&format!("Tunneling error ({}): {}", direction, e));
                break;
            }
        }
    }

    total
}
