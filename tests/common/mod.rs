//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use echo_server::lifecycle::Shutdown;
use echo_server::observability::logging::{level_filter, new_logger_timeless, LogFormat};
use echo_server::server::{with_timeout, Server};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Level;

/// In-memory log sink shared between the test and the server.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    /// Every JSON record written so far.
    pub fn records(&self) -> Vec<serde_json::Value> {
        let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        raw.lines()
            .map(|line| serde_json::from_str(line).expect("log line is JSON"))
            .collect()
    }

    /// The `message` field of every record, in order.
    pub fn messages(&self) -> Vec<String> {
        self.records()
            .iter()
            .filter_map(|r| r["message"].as_str().map(str::to_owned))
            .collect()
    }

    pub fn count(&self, message: &str) -> usize {
        self.messages().iter().filter(|m| *m == message).count()
    }
}

/// A server running in the background on an ephemeral localhost port.
pub struct TestServer {
    pub server: Arc<Server>,
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub serving: JoinHandle<()>,
    pub logs: LogBuffer,
}

/// Start a server with the given connection timeout.
pub async fn start_server(timeout: Duration) -> TestServer {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let logger = new_logger_timeless(
        move || writer.clone(),
        level_filter(Level::DEBUG, None),
        LogFormat::Json,
    );

    let server = Server::bind(
        logger,
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        [with_timeout(timeout)],
    )
    .await
    .unwrap();
    let server = Arc::new(server);
    let addr = server.addr();

    let shutdown = Shutdown::new();
    let serving = {
        let server = Arc::clone(&server);
        let signal = shutdown.wait();
        tokio::spawn(async move { server.listen_and_serve(signal).await })
    };

    TestServer {
        server,
        addr,
        shutdown,
        serving,
        logs,
    }
}

impl TestServer {
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    /// Poll until the in-flight handler count reaches `count`.
    pub async fn wait_for_active(&self, count: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.server.active_connections() != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} active connections, have {}",
                self.server.active_connections()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Trigger shutdown and wait for `listen_and_serve` to return.
    pub async fn stop(self) -> LogBuffer {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.serving)
            .await
            .expect("server stopped")
            .unwrap();
        self.logs
    }
}
