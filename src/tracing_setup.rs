//! Tracing initialisation.
//!
//! The library itself only emits `tracing` events; binaries and tests decide
//! where they go. This module wires up `tracing-subscriber` with:
//! - an `EnvFilter` (honours `RUST_LOG`, falls back to the configured level)
//! - a fmt layer in pretty, compact or JSON form
//!
//! # Example
//! ```no_run
//! use spillbuf::{config::SpillbufConfig, tracing_setup};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SpillbufConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//! tracing::info!("spill buffer ready");
//! # Ok(())
//! # }
//! ```

use crate::config::SpillbufConfig;
use std::io::{self, IsTerminal};
use tracing::{dispatcher, Level};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Shape of each emitted log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// How [`init`] sets up the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    /// Line format
    pub format: OutputFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
        }
    }
}

impl TracingConfig {
    /// Read level and format from the `[application]` section.
    pub fn from_config(config: &SpillbufConfig) -> Result<Self, String> {
        Ok(Self {
            level: parse_log_level(&config.application.log_level)?,
            format: parse_output_format(&config.application.log_format)?,
        })
    }
}

/// Initialize tracing from the application configuration
pub fn init_from_config(config: &SpillbufConfig) -> Result<(), String> {
    init(TracingConfig::from_config(config)?)
}

/// Install the global subscriber.
///
/// Events go to stderr so stdout stays free for piped data; colours are used only
/// when stderr is a terminal. If a global subscriber is already installed (by an
/// embedding application or a test harness) this is a no-op.
pub fn init(config: TracingConfig) -> Result<(), String> {
    if dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));
    let ansi = io::stderr().is_terminal();

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(io::stderr)
            .with_ansi(ansi)
            .with_thread_names(true)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_ansi(ansi)
            .with_thread_names(true)
            .boxed(),
        OutputFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
    };

    match tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
    {
        Ok(()) => Ok(()),
        // lost a race with another initialiser
        Err(_) if dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(format!("Failed to initialize tracing: {}", e)),
    }
}

fn parse_log_level(level: &str) -> Result<Level, String> {
    level
        .parse::<Level>()
        .map_err(|_| format!("Unknown log level '{}' (expected trace, debug, info, warn or error)", level))
}

fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_ascii_lowercase().as_str() {
        "pretty" => Ok(OutputFormat::Pretty),
        "compact" => Ok(OutputFormat::Compact),
        "json" => Ok(OutputFormat::Json),
        _ => Err(format!(
            "Unknown log format '{}' (expected pretty, compact or json)",
            format
        )),
    }
}
