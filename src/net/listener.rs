//! TCP listener with an out-of-band close.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Let any task close the listener while the accept loop is parked in
//!   `accept()`, surfacing [`ListenerError::Closed`] to it

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept a connection. Transient.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The listener has been closed.
    #[error("use of closed network listener")]
    Closed,
}

/// A TCP listener that can be closed from another task.
///
/// Closing marks the listener and releases the socket. If a task is blocked
/// in [`Listener::accept`] at that moment, that task releases it and returns
/// [`ListenerError::Closed`] without accepting anything further.
#[derive(Debug)]
pub struct Listener {
    /// The underlying TCP listener. `None` once closed.
    inner: Arc<Mutex<Option<TcpListener>>>,
    local_addr: SocketAddr,
    closer: ListenerCloser,
    #[cfg(test)]
    failures: std::sync::atomic::AtomicUsize,
}

impl Listener {
    /// Bind to `addr`. Port 0 requests an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::debug!(address = %local_addr, "listener bound");

        let inner = Arc::new(Mutex::new(Some(listener)));
        Ok(Self {
            closer: ListenerCloser::new(Arc::clone(&inner)),
            inner,
            local_addr,
            #[cfg(test)]
            failures: Default::default(),
        })
    }

    /// Accept a new connection.
    ///
    /// Returns [`ListenerError::Closed`] once [`ListenerCloser::close`] has been
    /// called, dropping the socket so further connection attempts are refused.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let mut slot = self.inner.lock().await;
        let Some(listener) = slot.as_ref() else {
            return Err(ListenerError::Closed);
        };

        #[cfg(test)]
        if self.take_failure() {
            return Err(ListenerError::Accept(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "connection aborted",
            )));
        }

        let accepted = tokio::select! {
            biased;
            _ = self.closer.closed() => None,
            accepted = listener.accept() => Some(accepted),
        };

        match accepted {
            Some(accepted) => accepted.map_err(ListenerError::Accept),
            None => {
                slot.take();
                tracing::debug!(address = %self.local_addr, "listener socket released");
                Err(ListenerError::Closed)
            }
        }
    }

    /// Get the local address this listener is bound to.
    ///
    /// Still available after the listener is closed.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that closes this listener from any task.
    pub fn closer(&self) -> ListenerCloser {
        self.closer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Make the next `count` accepts fail with a transient error.
    #[cfg(test)]
    pub(crate) fn fail_next_accepts(&self, count: usize) {
        self.failures
            .fetch_add(count, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn take_failure(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Cloneable handle that closes a [`Listener`].
#[derive(Debug, Clone)]
pub struct ListenerCloser {
    closed: Arc<watch::Sender<bool>>,
    socket: Arc<Mutex<Option<TcpListener>>>,
}

impl ListenerCloser {
    fn new(socket: Arc<Mutex<Option<TcpListener>>>) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            closed: Arc::new(tx),
            socket,
        }
    }

    /// Close the listener. Never blocks.
    ///
    /// The socket is released immediately unless an accept is in progress,
    /// in which case that accept releases it as it returns.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.close_with(|| {})
    }

    /// Like [`ListenerCloser::close`], running `announce` just before the
    /// listener is marked closed. `announce` runs at most once across all
    /// clones, even under concurrent calls.
    pub fn close_with<F>(&self, announce: F) -> bool
    where
        F: FnOnce(),
    {
        let closed = self.closed.send_if_modified(|closed| {
            if *closed {
                return false;
            }
            announce();
            *closed = true;
            true
        });

        if let Ok(mut slot) = self.socket.try_lock() {
            if slot.take().is_some() {
                tracing::debug!("listener socket released");
            }
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
