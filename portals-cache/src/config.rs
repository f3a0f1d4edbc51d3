//! Cache Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.

use std::env;

use thiserror::Error;

use crate::constants::{
    EVENT_CHANNEL_CAPACITY_DEFAULT, EVENT_CHANNEL_CAPACITY_MAX, PAGINATION_CURSOR_PREFIX_DEFAULT,
    PAGINATION_PAGE_SIZE_DEFAULT, PAGINATION_PAGE_SIZE_MAX,
};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Page size outside `[1, PAGINATION_PAGE_SIZE_MAX]`
    #[error("invalid page size: {value} (must be in [1, {PAGINATION_PAGE_SIZE_MAX}])")]
    InvalidPageSize {
        /// The rejected value
        value: usize,
    },

    /// Channel capacity outside `[1, EVENT_CHANNEL_CAPACITY_MAX]`
    #[error("invalid event channel capacity: {value} (must be in [1, {EVENT_CHANNEL_CAPACITY_MAX}])")]
    InvalidChannelCapacity {
        /// The rejected value
        value: usize,
    },

    /// Empty cursor prefix
    #[error("cursor prefix cannot be empty")]
    EmptyCursorPrefix,

    /// Environment variable that does not parse
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

// =============================================================================
// CacheConfig
// =============================================================================

/// Session-wide cache settings.
///
/// # Example
///
/// ```rust
/// use portals_cache::CacheConfig;
///
/// let config = CacheConfig::default().with_page_size(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Records per page for list views.
    ///
    /// Default: 20
    pub page_size: usize,

    /// Buffered events per subscriber before it lags.
    ///
    /// Default: 256
    pub event_channel_capacity: usize,

    /// Prefix of cursor-cache signatures.
    ///
    /// Default: "portals"
    pub cursor_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: PAGINATION_PAGE_SIZE_DEFAULT,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY_DEFAULT,
            cursor_prefix: PAGINATION_CURSOR_PREFIX_DEFAULT.to_string(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PORTALS_PAGE_SIZE`,
    /// `PORTALS_EVENT_CHANNEL_CAPACITY` and `PORTALS_CURSOR_PREFIX`.
    ///
    /// # Errors
    /// Returns `ConfigError` when a variable does not parse or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = read_env("PORTALS_PAGE_SIZE")? {
            config.page_size = value;
        }
        if let Some(value) = read_env("PORTALS_EVENT_CHANNEL_CAPACITY")? {
            config.event_channel_capacity = value;
        }
        if let Ok(prefix) = env::var("PORTALS_CURSOR_PREFIX") {
            config.cursor_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the cursor prefix.
    #[must_use]
    pub fn with_cursor_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cursor_prefix = prefix.into();
        self
    }

    /// Check every limit.
    ///
    /// # Errors
    /// Returns the first violated limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=PAGINATION_PAGE_SIZE_MAX).contains(&self.page_size) {
            return Err(ConfigError::InvalidPageSize {
                value: self.page_size,
            });
        }
        if !(1..=EVENT_CHANNEL_CAPACITY_MAX).contains(&self.event_channel_capacity) {
            return Err(ConfigError::InvalidChannelCapacity {
                value: self.event_channel_capacity,
            });
        }
        if self.cursor_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyCursorPrefix);
        }
        Ok(())
    }
}

fn read_env(name: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CacheConfig::default();

        assert_eq!(config.page_size, PAGINATION_PAGE_SIZE_DEFAULT);
        assert_eq!(config.event_channel_capacity, EVENT_CHANNEL_CAPACITY_DEFAULT);
        assert_eq!(config.cursor_prefix, "portals");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = CacheConfig::new()
            .with_page_size(10)
            .with_event_channel_capacity(8)
            .with_cursor_prefix("books");

        assert_eq!(config.page_size, 10);
        assert_eq!(config.event_channel_capacity, 8);
        assert_eq!(config.cursor_prefix, "books");
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            CacheConfig::default().with_page_size(0).validate(),
            Err(ConfigError::InvalidPageSize { value: 0 })
        );
        assert!(CacheConfig::default()
            .with_page_size(PAGINATION_PAGE_SIZE_MAX + 1)
            .validate()
            .is_err());
        assert!(CacheConfig::default()
            .with_event_channel_capacity(0)
            .validate()
            .is_err());
        assert_eq!(
            CacheConfig::default().with_cursor_prefix(" ").validate(),
            Err(ConfigError::EmptyCursorPrefix)
        );
    }

    #[test]
    fn test_from_env() {
        // Single test touches the environment to avoid races between tests
        env::set_var("PORTALS_PAGE_SIZE", "15");
        env::set_var("PORTALS_CURSOR_PREFIX", "sites");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.page_size, 15);
        assert_eq!(config.cursor_prefix, "sites");

        env::set_var("PORTALS_PAGE_SIZE", "many");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(ConfigError::InvalidEnv { name: "PORTALS_PAGE_SIZE", .. })
        ));

        env::remove_var("PORTALS_PAGE_SIZE");
        env::remove_var("PORTALS_CURSOR_PREFIX");
        assert_eq!(CacheConfig::from_env().unwrap(), CacheConfig::default());
    }
}
