//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags (clap)  ─┐
//! environment       ─┼→ loader.rs (merge by precedence)
//! TOML file (serde) ─┘    → validation.rs (semantic checks)
//!                         → Config (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow an empty or absent config file
//! - The environment is injected as a lookup function so resolution is testable
//! - Validation separates syntactic (serde, clap) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{Cli, Config, ConfigError};
pub use schema::FileConfig;
