//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGQUIT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Shutdown::wait resolves → server watcher task → stop accepting
//!     → drain connections → listen_and_serve returns → exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - No forced exit: drain is bounded by the per-connection timeout

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
