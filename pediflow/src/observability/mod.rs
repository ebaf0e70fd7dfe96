//! Logging bootstrap.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. [`init_tracing`] is the one-call setup the CLI uses.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::PediflowError;

/// Filter used when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter: the configured directive, else `RUST_LOG`, else
/// [`DEFAULT_FILTER`].
///
/// # Errors
///
/// Returns [`PediflowError::Logging`] when the configured directive does
/// not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, PediflowError> {
    match config.level.as_deref() {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| PediflowError::Logging(format!("invalid log level '{level}': {e}"))),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Installs the global subscriber: human-readable lines on stderr, or JSON
/// lines when `config.json` is set.
///
/// # Errors
///
/// Returns [`PediflowError::Logging`] for an invalid directive or when a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PediflowError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| PediflowError::Logging(e.to_string()))
}
