//! Structured logging.
//!
//! # Responsibilities
//! - Build logger handles (`tracing::Dispatch`) for injection into the server
//! - Map `LOG_LEVEL` / `LOG_MODE` style settings to subscriber configuration
//! - Provide the process-wide fallback logger for the outermost boundary
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - Core components receive their `Dispatch` explicitly, never the global one

use std::sync::OnceLock;

use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Output encoding for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable text.
    Text,
}

impl LogFormat {
    /// `"json"` (any case) selects JSON; everything else is text.
    pub fn from_mode(mode: &str) -> Self {
        if mode.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Convert a level name to a [`Level`].
///
/// Supports `debug`, `info`, `warn` and `error`, case-insensitive. Any other
/// input yields `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build a filter from a level, optionally overridden by `EnvFilter`
/// directives (the `RUST_LOG` syntax). Invalid directives fall back to the
/// level.
pub fn level_filter(level: Level, directives: Option<&str>) -> EnvFilter {
    if let Some(directives) = directives.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("ignoring invalid log directives {directives:?}: {e}"),
        }
    }
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

/// Create a logger handle writing to `writer`.
pub fn new_logger<W>(writer: W, filter: EnvFilter, format: LogFormat) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build(writer, filter, format, true)
}

/// Like [`new_logger`] but without the timestamp, so output is deterministic.
pub fn new_logger_timeless<W>(writer: W, filter: EnvFilter, format: LogFormat) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    build(writer, filter, format, false)
}

fn build<W>(writer: W, filter: EnvFilter, format: LogFormat, with_time: bool) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match (format, with_time) {
        (LogFormat::Json, true) => Dispatch::new(builder.json().flatten_event(true).finish()),
        (LogFormat::Json, false) => Dispatch::new(
            builder
                .json()
                .flatten_event(true)
                .without_time()
                .finish(),
        ),
        (LogFormat::Text, true) => Dispatch::new(builder.finish()),
        (LogFormat::Text, false) => Dispatch::new(builder.without_time().finish()),
    }
}

/// Process-wide fallback logger: JSON on stderr at `INFO`.
///
/// Initialized on first use. Only the binary's composition root should reach
/// for this; everything else takes a `Dispatch` argument.
pub fn default_logger() -> &'static Dispatch {
    static DEFAULT: OnceLock<Dispatch> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        new_logger(
            std::io::stderr,
            level_filter(Level::INFO, None),
            LogFormat::Json,
        )
    })
}

/// The dispatcher active for the current task or thread.
///
/// Ambient lookup for leaf utilities that have no logger passed to them.
pub fn current() -> Dispatch {
    tracing::dispatcher::get_default(|dispatch| dispatch.clone())
}
