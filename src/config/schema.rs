//! Configuration schema definitions.
//!
//! The optional TOML file. Every field has a default so a partial (or empty)
//! file is valid.

use serde::{Deserialize, Serialize};

/// Port the server listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 7777;

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// `[server]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,

    /// Maximum connection lifetime in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_ms: 5_000,
        }
    }
}

/// `[logging]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `debug`, `info`, `warn` or `error`.
    pub level: String,

    /// `json` or `text`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();
        assert_eq!(config.server.port, 7777);
        assert_eq!(config.server.timeout_ms, 5_000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            port = 9000
            timeout_ms = 250

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.timeout_ms, 250);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_partial_toml() {
        let config: FileConfig = toml::from_str("[server]\nport = 1234\n").unwrap();
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.server.timeout_ms, 5_000);
        assert_eq!(config.logging, LoggingConfig::default());

        assert_eq!(toml::from_str::<FileConfig>("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        assert!(toml::from_str::<FileConfig>("[server]\nport = 70000\n").is_err());
    }
}
