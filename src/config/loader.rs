//! Configuration loading from the command line, environment and disk.
//!
//! Precedence, highest first: CLI flags, environment variables, the TOML
//! file given with `--config`, built-in defaults.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::schema::FileConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::observability::logging::{self, LogFormat};

/// Log verbosity: `debug`, `info`, `warn` or `error` (case-insensitive).
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
/// Log encoding: `json` selects JSON, anything else text.
pub const LOG_MODE_ENV: &str = "LOG_MODE";
/// Full `EnvFilter` directives; overrides `LOG_LEVEL` when set.
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(name = "echo-server")]
#[command(version)]
#[command(about = "TCP server that echoes back every byte it receives", long_about = None)]
pub struct Cli {
    /// Port for the server to listen on [default: 7777]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum connection lifetime in milliseconds [default: 5000]
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Long flags that may also be spelled with a single dash.
const LONG_FLAGS: [&str; 3] = ["port", "timeout-ms", "config"];

/// Rewrite single-dash long flags (`-port 9000`, `-port=9000`) to their
/// double-dash form. Everything else passes through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{text}"))
            } else {
                arg
            }
        })
        .collect()
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Final resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub timeout: Duration,
    pub log_level: Level,
    pub log_format: LogFormat,
    /// Raw `RUST_LOG` directives, if any.
    pub log_directives: Option<String>,
}

impl Config {
    /// Load from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = Cli::parse_from(normalize_args(std::env::args_os()));
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Merge `cli`, the environment (looked up through `env`) and the
    /// optional config file, then validate.
    pub fn resolve<E>(cli: Cli, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let file = match &cli.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };

        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let log_level = env(LOG_LEVEL_ENV).unwrap_or(file.logging.level);
        let log_mode = env(LOG_MODE_ENV).unwrap_or(file.logging.format);

        let config = Config {
            port: cli.port.unwrap_or(file.server.port),
            timeout: Duration::from_millis(cli.timeout_ms.unwrap_or(file.server.timeout_ms)),
            log_level: logging::parse_level(&log_level),
            log_format: LogFormat::from_mode(&log_mode),
            log_directives: env(RUST_LOG_ENV),
        };

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// The subscriber filter for this configuration.
    pub fn log_filter(&self) -> EnvFilter {
        logging::level_filter(self.log_level, self.log_directives.as_deref())
    }
}

/// Read and parse a TOML configuration file.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
