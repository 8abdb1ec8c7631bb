//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGINT, SIGTERM, SIGQUIT)
//! - Translate the first signal into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Only Ctrl-C is available off unix

use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use crate::lifecycle::shutdown::Shutdown;
use crate::observability::logging;

/// Wait for the first process termination signal.
///
/// Returns the name of the signal received.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Wait for the first process termination signal.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Spawn a task that triggers `shutdown` on the first termination signal.
///
/// If the handlers cannot be installed the error is logged and shutdown is
/// triggered right away rather than leaving the process unstoppable. The task
/// logs through the caller's current dispatcher.
pub fn forward(shutdown: Shutdown) -> JoinHandle<()> {
    let task = async move {
        match shutdown_signal().await {
            Ok(name) => tracing::info!(signal = name, "received termination signal"),
            Err(e) => tracing::error!(error = %e, "failed to install signal handlers"),
        }
        shutdown.trigger();
    };
    tokio::spawn(task.with_subscriber(logging::current()))
}
