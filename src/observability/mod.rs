//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server, listener, connection handlers
//!     → injected Dispatch (logging.rs)
//!     → stderr, JSON or text
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection ID flows through every per-connection log line

pub mod logging;
