//! Tracing subscriber setup.
//!
//! Stdout carries the protocol, so all log output goes to stderr.

use crate::config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Pick the filter: an explicit level wins, then `RUST_LOG`, then the
/// configured level.
pub fn build_filter(config: &LoggingConfig, cli_level: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let parse = |directive: &str| {
        EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
            directive: directive.to_string(),
            source,
        })
    };

    if let Some(level) = cli_level {
        return parse(level);
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => parse(&config.level),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig, cli_level: Option<&str>) -> Result<(), LoggingError> {
    let filter = build_filter(config, cli_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))
}
