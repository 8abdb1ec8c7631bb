//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, out-of-band close)
//!     → connection.rs (ID, deadline, mirror, in-flight tracking)
//!     → Closed on drop
//!
//! Connection States:
//!     Accepted → Active (deadline armed) → Closed (normal | timeout | error)
//! ```
//!
//! # Design Decisions
//! - Closing the listener never touches in-flight connections
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
