//! TCP echo server library.
//!
//! Accepts connections, mirrors every byte back until the client closes or
//! the per-connection deadline passes, and shuts down gracefully by closing
//! the listener and draining in-flight connections.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::Config;
pub use lifecycle::Shutdown;
pub use server::{with_timeout, Server, ServerOption, ShutdownHandle};
