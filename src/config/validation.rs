//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde and clap handle syntactic)
//! - Validate value ranges (timeout > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: Config → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::loader::Config;

/// A single semantic problem with a resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Check a resolved configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
