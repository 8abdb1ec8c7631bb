//! Server options.
//!
//! Each option is a mutation of [`ServerSettings`]. Options are applied in the
//! order given, so a later option overrides an earlier one for the same field.

use std::fmt;
use std::time::Duration;

/// Time to wait before timing out a connection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunable server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Maximum lifetime of a connection. A single absolute deadline, armed on
    /// accept and never extended.
    pub timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Overrides a default setting.
pub struct ServerOption(Box<dyn FnOnce(&mut ServerSettings) + Send>);

impl ServerOption {
    /// Build an option from an arbitrary mutation.
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut ServerSettings) + Send + 'static,
    {
        Self(Box::new(apply))
    }

    pub fn apply(self, settings: &mut ServerSettings) {
        (self.0)(settings)
    }
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerOption(..)")
    }
}

/// Sets the maximum duration for requests.
pub fn with_timeout(timeout: Duration) -> ServerOption {
    ServerOption::new(move |settings| settings.timeout = timeout)
}

impl ServerSettings {
    /// Defaults with `options` applied in order.
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let mut settings = Self::default();
        for option in options {
            option.apply(&mut settings);
        }
        settings
    }
}
