//! Logging setup
//!
//! The library only emits `tracing` events; applications (and tests that
//! want output) install a subscriber once with [`init_logging`].
//! `RUST_LOG` takes precedence over the default filter.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when the caller has no preference
pub const DEFAULT_LOG_FILTER: &str = "position_stabilizer=info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Install a stdout fmt subscriber filtered by `RUST_LOG` or `default_filter`
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    let fallback = EnvFilter::try_new(default_filter).map_err(|source| LoggingError::InvalidFilter {
        filter: default_filter.to_string(),
        source,
    })?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(fallback);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_filter() {
        let result = init_logging("position_stabilizer=loud");
        assert!(matches!(result, Err(LoggingError::InvalidFilter { .. })));
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        // Another test may already own the global subscriber
        let _ = init_logging(DEFAULT_LOG_FILTER);
        assert!(matches!(
            init_logging(DEFAULT_LOG_FILTER),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
