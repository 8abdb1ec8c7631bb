//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate random connection IDs for log correlation
//! - Arm a single absolute I/O deadline per connection
//! - Mirror input back to the peer
//! - Track in-flight connections for graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// Random identifier for a connection, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new random connection ID.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-connection failures. Logged by the handler, never propagated.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("i/o timeout: deadline of {timeout:?} exceeded")]
    DeadlineExceeded { timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::DeadlineExceeded { .. })
    }
}

/// An accepted client connection.
///
/// `Accepted → Active(deadline armed) → Closed`. The stream is closed when the
/// value is dropped, whichever way the handler exits.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    /// `None` only while dropping.
    stream: Option<TcpStream>,
    local_addr: Option<SocketAddr>,
    remote_addr: SocketAddr,
    timeout: Duration,
    deadline: Instant,
}

impl Connection {
    /// Take ownership of an accepted stream and arm its deadline.
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, timeout: Duration) -> Self {
        let id = ConnectionId::random();
        let local_addr = stream.local_addr().ok();

        tracing::info!(
            client_id = %id,
            local_addr = ?local_addr,
            remote_addr = %remote_addr,
            "accepted conn"
        );

        let now = Instant::now();
        // Saturate instead of overflowing for absurd timeouts.
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30));

        Self {
            id,
            stream: Some(stream),
            local_addr,
            remote_addr,
            timeout,
            deadline,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Copy everything read from the peer back to it until end-of-stream.
    ///
    /// Every read and write shares the deadline armed in [`Connection::new`];
    /// it is not extended by activity. Returns the number of bytes echoed.
    pub async fn mirror(&mut self) -> Result<u64, ConnectionError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        let (mut reader, mut writer) = stream.split();
        let copy = tokio::io::copy(&mut reader, &mut writer);

        match tokio::time::timeout_at(self.deadline, copy).await {
            Ok(copied) => Ok(copied?),
            Err(_) => Err(ConnectionError::DeadlineExceeded {
                timeout: self.timeout,
            }),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        drop(self.stream.take());
        tracing::info!(client_id = %self.id, "closed conn");
    }
}

/// Counting wait group over in-flight connection handlers.
///
/// Incremented by [`ConnectionTracker::track`], decremented when the returned
/// guard drops.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new in-flight handler. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|count| *count += 1);
        ConnectionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Get current in-flight handler count.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until every tracked handler has finished.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a handler's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|count| *count -= 1);
    }
}
