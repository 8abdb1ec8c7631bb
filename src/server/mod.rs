//! Echo server: accept loop and shutdown coordination.
//!
//! # Data Flow
//! ```text
//! Server::new        bind listener, apply options
//! listen_and_serve   spawn signal watcher, then loop:
//!     accept → track → spawn handler (mirror bytes until EOF/deadline/error)
//!     Closed → wait for tracked handlers → return
//! shutdown           close listener (never blocks, safe to repeat)
//! ```
//!
//! # Design Decisions
//! - The logger is an injected `tracing::Dispatch`, not the global default
//! - In-flight connections are never force-closed; they drain through their
//!   own deadlines, so shutdown latency is bounded by the timeout
//! - The drain happens on the accept loop's exit path, not in `shutdown`

pub mod handler;
pub mod options;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerCloser, ListenerError};

pub use options::{with_timeout, ServerOption, ServerSettings, DEFAULT_TIMEOUT};

/// Accepts TCP connections and echoes every byte back.
///
/// Once it has been shut down it is not reusable: a second
/// [`Server::listen_and_serve`] returns right away.
#[derive(Debug)]
pub struct Server {
    listener: Listener,
    logger: Dispatch,
    timeout: Duration,
    tracker: ConnectionTracker,
}

impl Server {
    /// Bind `0.0.0.0:port` and apply `options` over the defaults.
    pub async fn new<I>(logger: Dispatch, port: u16, options: I) -> Result<Self, ListenerError>
    where
        I: IntoIterator<Item = ServerOption>,
    {
        Self::bind(logger, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), options).await
    }

    /// Like [`Server::new`] but binds an explicit address.
    pub async fn bind<I>(logger: Dispatch, addr: SocketAddr, options: I) -> Result<Self, ListenerError>
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let listener = Listener::bind(addr)
            .with_subscriber(logger.clone())
            .await?;
        let settings = ServerSettings::from_options(options);

        Ok(Self {
            listener,
            logger,
            timeout: settings.timeout,
            tracker: ConnectionTracker::new(),
        })
    }

    /// The listener's bound address.
    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Effective per-connection timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of connection handlers still running.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// A cloneable handle that can shut this server down from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            closer: self.listener.closer(),
            logger: self.logger.clone(),
            addr: self.addr(),
        }
    }

    /// Stop accepting new connections.
    ///
    /// In-flight connections are left alone. Does not wait for them; that
    /// happens when [`Server::listen_and_serve`] returns.
    pub fn shutdown(&self) {
        self.shutdown_handle().shutdown();
    }

    /// Serve until `signal` resolves or [`Server::shutdown`] is called, then
    /// wait for every in-flight connection to finish.
    pub async fn listen_and_serve<F>(&self, signal: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.serve(signal)
            .with_subscriber(self.logger.clone())
            .await
    }

    async fn serve<F>(&self, signal: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        tracing::info!(%addr, "start accepting tcp conns");

        let watcher = {
            let handle = self.shutdown_handle();
            tokio::spawn(async move {
                signal.await;
                handle.shutdown();
            })
        };

        loop {
            match self.listener.accept().await {
                Ok((stream, remote_addr)) => {
                    let guard = self.tracker.track();
                    let task = handler::handle_connection(stream, remote_addr, self.timeout, guard);
                    tokio::spawn(task.with_subscriber(self.logger.clone()));
                }
                Err(ListenerError::Closed) => {
                    tracing::info!(%addr, "waiting for clients to disconnect");
                    self.tracker.wait_idle().await;
                    tracing::info!(%addr, "shutting down server");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept conn");
                }
            }
        }

        watcher.abort();
    }
}

/// Closes a [`Server`]'s listener from any task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    closer: ListenerCloser,
    logger: Dispatch,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Stop accepting new connections. Repeated calls are no-ops.
    pub fn shutdown(&self) {
        tracing::dispatcher::with_default(&self.logger, || {
            let addr = self.addr;
            let closed = self.closer.close_with(|| {
                tracing::info!(%addr, "shutdown signal received");
                tracing::info!(%addr, "stop accepting tcp conns");
            });
            if !closed {
                tracing::debug!(%addr, "listener already closed");
            }
        });
    }

    pub fn is_shutdown(&self) -> bool {
        self.closer.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::{level_filter, new_logger_timeless, LogFormat};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tracing::Level;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    fn quiet_logger() -> Dispatch {
        new_logger_timeless(std::io::sink, level_filter(Level::ERROR, None), LogFormat::Text)
    }

    async fn local_server(options: Vec<ServerOption>) -> Server {
        Server::bind(quiet_logger(), SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_binds_ephemeral_port() {
        let server = Server::new(quiet_logger(), 0, []).await.unwrap();
        assert_ne!(server.addr().port(), 0);
        assert_eq!(server.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(server.active_connections(), 0);
    }

    #[tokio::test]
    async fn new_fails_when_port_taken() {
        let first = Server::new(quiet_logger(), 0, []).await.unwrap();
        let err = Server::new(quiet_logger(), first.addr().port(), [])
            .await
            .unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[tokio::test]
    async fn with_timeout_overrides_default() {
        let server = local_server(vec![with_timeout(Duration::from_millis(100))]).await;
        assert_eq!(server.timeout(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn shutdown_before_serve_returns_immediately() {
        let server = local_server(vec![]).await;
        server.shutdown();
        server.shutdown();
        assert!(server.shutdown_handle().is_shutdown());
        assert!(TcpStream::connect(server.addr()).await.is_err());

        tokio::time::timeout(
            Duration::from_secs(1),
            server.listen_and_serve(std::future::pending()),
        )
        .await
        .expect("serve returns after an empty drain");
    }

    #[tokio::test]
    async fn serve_after_shutdown_is_a_no_op() {
        let server = local_server(vec![]).await;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();

        server
            .listen_and_serve(async move {
                let _ = rx.await;
            })
            .await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server.listen_and_serve(std::future::pending()),
        )
        .await
        .expect("second serve does not block");
    }

    #[tokio::test]
    async fn accept_error_is_logged_and_serving_continues() {
        let capture = Capture::default();
        let writer = capture.clone();
        let logger = new_logger_timeless(
            move || writer.clone(),
            level_filter(Level::INFO, None),
            LogFormat::Text,
        );
        let server = Server::bind(logger, SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), [])
            .await
            .unwrap();
        server.listener.fail_next_accepts(1);
        let server = Arc::new(server);

        let serving = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen_and_serve(std::future::pending()).await })
        };

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        stream.write_all(b"after").await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"after");
        drop(stream);

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(2), serving)
            .await
            .expect("serve returns after shutdown")
            .unwrap();

        let lines = capture.lines();
        let failures: Vec<_> = lines.iter().filter(|l| l.contains("accept conn")).collect();
        assert_eq!(failures.len(), 1, "{lines:?}");
        assert!(failures[0].contains("ERROR"));
        assert!(failures[0].contains("connection aborted"));
        assert!(lines.iter().any(|l| l.contains("accepted conn")));
    }
}
