//! Tracing Setup
//!
//! `TigerStyle`: Optional, idempotent, never panics. Library code only emits
//! `tracing` events; binaries and tests opt into a subscriber here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use portals_cache::telemetry::{init_tracing, TelemetryConfig};
//!
//! init_tracing(TelemetryConfig::default()).expect("tracing init");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Filter directives (default: `portals_cache=info`)

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::TELEMETRY_FILTER_DEFAULT;

/// Tracing setup errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directives do not parse
    #[error("invalid filter directives {directives:?}: {reason}")]
    InvalidFilter {
        /// The rejected directives
        directives: String,
        /// Parser message
        reason: String,
    },
}

/// Result type for tracing setup.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Include the event target in output
    pub with_target: bool,
    /// Route output through the test writer
    pub test_writer: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: TELEMETRY_FILTER_DEFAULT.to_string(),
            with_target: true,
            test_writer: false,
        }
    }
}

impl TelemetryConfig {
    /// Config suited for tests: output captured per test.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            test_writer: true,
            ..Self::default()
        }
    }

    /// Set the fallback filter directives.
    #[must_use]
    pub fn with_default_filter(mut self, directives: impl Into<String>) -> Self {
        self.default_filter = directives.into();
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.default_filter).map_err(|e| TelemetryError::InvalidFilter {
            directives: self.default_filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Install a global fmt subscriber.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
///
/// # Errors
/// Returns `TelemetryError::InvalidFilter` when the default directives do not
/// parse.
pub fn init_tracing(config: TelemetryConfig) -> Result<bool> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = if config.test_writer {
        builder.with_test_writer().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.default_filter, "tracing initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_filter, "portals_cache=info");
        assert!(!config.test_writer);
        assert!(TelemetryConfig::for_tests().test_writer);
    }

    #[test]
    fn test_init_is_idempotent() {
        let first = init_tracing(TelemetryConfig::for_tests()).unwrap();
        let second = init_tracing(TelemetryConfig::for_tests()).unwrap();
        // Another test may have installed it first; never twice
        assert!(!(first && second));
        assert!(!second);
    }

    #[test]
    fn test_invalid_filter() {
        let config = TelemetryConfig::for_tests().with_default_filter("portals_cache=verbose");
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(
                init_tracing(config),
                Err(TelemetryError::InvalidFilter { .. })
            ));
        }
    }
}
