//! Tracing subscriber setup for the tictac room server.
//!
//! One call to [`init_telemetry`] at startup installs an [`EnvFilter`] and a
//! stdout formatting layer, pretty or JSON. `RUST_LOG` takes precedence over
//! the configured levels.

#![deny(unsafe_code)]

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Stdout log format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line, with span context.
    Json,
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// Per-module level overrides (e.g. `"tictac_server::hub"` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Output format.
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    /// Build a config from string level directives, as found in settings
    /// files and environment variables.
    pub fn from_levels<'a, I>(level: &str, modules: I, format: LogFormat) -> Result<Self, TelemetryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let log_level = parse_level(level)?;
        let module_levels = modules
            .into_iter()
            .map(|(module, level)| Ok((module.to_string(), parse_level(level)?)))
            .collect::<Result<Vec<_>, TelemetryError>>()?;
        Ok(Self {
            log_level,
            module_levels,
            format,
        })
    }

    /// Filter directive string, e.g. `info,tower_http=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push(',');
            filter.push_str(module);
            filter.push('=');
            filter.push_str(&level.to_string().to_lowercase());
        }
        filter
    }
}

/// Errors from telemetry setup.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A level directive did not name a tracing level.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

fn parse_level(level: &str) -> Result<Level, TelemetryError> {
    Level::from_str(level.trim()).map_err(|_| TelemetryError::InvalidLevel(level.to_string()))
}

/// Initialize the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()?;
    Ok(())
}
