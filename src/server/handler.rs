//! Per-connection handler task.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::net::connection::{Connection, ConnectionGuard};

/// Serve one accepted connection end-to-end.
///
/// Errors (including deadline expiry) are logged and swallowed. The
/// connection is closed before `guard` is released, on every exit path.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    timeout: Duration,
    guard: ConnectionGuard,
) {
    let _guard = guard;
    let mut conn = Connection::new(stream, remote_addr, timeout);

    match conn.mirror().await {
        Ok(bytes) => {
            tracing::debug!(client_id = %conn.id(), bytes, "client closed stream");
        }
        Err(e) => {
            tracing::error!(client_id = %conn.id(), error = %e, "responded");
        }
    }
}
