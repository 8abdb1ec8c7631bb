//! echo-server
//!
//! A TCP server that echoes back every byte it receives.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──connect──▶ ┌──────────┐  accept   ┌───────────────────────┐
//!                         │ listener │─────────▶ │ handler task (per     │
//!                         └────▲─────┘           │ connection): deadline,│
//!                              │ close           │ mirror, close         │
//!     SIGINT/TERM/QUIT ──▶ Shutdown ──▶ watcher  └───────────────────────┘
//!                                                 drained before exit
//! ```
//!
//! Configuration: `--port` (default 7777), `--timeout-ms`, `--config <toml>`,
//! `LOG_LEVEL` (debug|info|warn|error), `LOG_MODE` (json|text), `RUST_LOG`.

use echo_server::config::Config;
use echo_server::lifecycle::{signals, Shutdown};
use echo_server::observability::logging;
use echo_server::server::{with_timeout, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::dispatcher::with_default(logging::default_logger(), || {
                tracing::error!(error = %e, "load configuration");
            });
            return Err(e.into());
        }
    };

    // Initialize logging
    let logger = logging::new_logger(std::io::stderr, config.log_filter(), config.log_format);
    if tracing::dispatcher::set_global_default(logger.clone()).is_err() {
        eprintln!("global logger already installed");
    }

    tracing::info!(
        port = config.port,
        timeout_ms = config.timeout.as_millis() as u64,
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "echo-server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let shutdown = Shutdown::new();
    signals::forward(shutdown.clone());

    let server = Server::new(logger, config.port, [with_timeout(config.timeout)])
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "init server");
            e
        })?;

    server.listen_and_serve(shutdown.wait()).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
