/// Common utilities for integration tests
use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;

use proxy_relay::{ConnectionRecord, EventSink, ServerHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener as TokioTcpListener;

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to random port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Echo server that closes each connection after echoing `limit` bytes
///
/// The tunnel keeps the upstream write half open after the client closes,
/// so an upstream that only stops on EOF would pin the session forever.
/// Closing after a known byte budget lets sessions complete.
pub async fn start_echo_server(port: u16, limit: usize) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = TokioTcpListener::bind(format!("127.0.0.1:{}", port))
            .await
            .expect("Failed to bind echo server");

        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut echoed = 0usize;
                        while echoed < limit {
                            match socket.read(&mut buf).await {
                                Ok(0) => break, // Connection closed
                                Ok(n) => {
                                    if socket.write_all(&buf[..n]).await.is_err() {
                                        break;
                                    }
                                    echoed += n;
                                }
                                Err(_) => break,
                            }
                        }
                        socket.shutdown().await.ok();
                    });
                }
                Err(_) => break,
            }
        }
    })
}

/// One-shot HTTP upstream: captures the request, sends a canned response,
/// then closes. Returns the captured request bytes through the channel.
pub async fn start_oneshot_upstream(
    port: u16,
    response: &'static [u8],
) -> tokio::sync::oneshot::Receiver<Vec<u8>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let listener = TokioTcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .expect("Failed to bind upstream");

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            buf.truncate(n);
            socket.write_all(response).await.ok();
            socket.shutdown().await.ok();
            let _ = tx.send(buf);
        }
    });

    rx
}

/// Wait until the proxy listener reports itself running
///
/// Probing with a TCP connect would count as an accepted connection and
/// skew the counters under test, hence the flag poll.
pub async fn wait_until_running(handle: &ServerHandle) {
    for _ in 0..50 {
        if handle.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("proxy did not start in time");
}

/// Wait until the listener has counted at least `total` accepted connections
///
/// A freshly dropped client may not have been through the accept loop yet,
/// so counter assertions need this before they can trust the totals.
pub async fn wait_for_total(handle: &ServerHandle, total: u64) {
    for _ in 0..100 {
        if handle.stats().total_requests >= total {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} accepted connection(s), saw {}",
        total,
        handle.stats().total_requests
    );
}

/// Wait until every in-flight connection has drained
pub async fn wait_for_drain(handle: &ServerHandle) {
    for _ in 0..100 {
        if handle.stats().active_connections == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "connections did not drain, {} still active",
        handle.stats().active_connections
    );
}

/// Sink that records every notification for later assertions
#[derive(Default)]
pub struct RecordingSink {
    stats: Mutex<Vec<(u64, u64)>>,
    logs: Mutex<Vec<String>>,
    records: Mutex<Vec<ConnectionRecord>>,
}

impl RecordingSink {
    pub fn stats(&self) -> Vec<(u64, u64)> {
        self.stats.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn has_log_containing(&self, needle: &str) -> bool {
        self.logs.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl EventSink for RecordingSink {
    fn on_stats(&self, active: u64, total: u64) {
        self.stats.lock().unwrap().push((active, total));
    }

    fn on_log(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    fn on_record(&self, record: ConnectionRecord) {
        self.records.lock().unwrap().push(record);
    }
}
