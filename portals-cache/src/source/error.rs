//! Fetch Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Errors from a remote fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote answered with an error
    #[error("remote error: {message}")]
    Remote {
        /// Error message from the remote
        message: String,
    },

    /// No answer in time
    #[error("timeout after {duration_ms}ms")]
    Timeout {
        /// Duration in milliseconds
        duration_ms: u64,
    },

    /// Transport could not reach the remote
    #[error("connection error: {message}")]
    Connection {
        /// Connection error message
        message: String,
    },

    /// Simulated fault (for DST)
    #[error("simulated fault: {fault_type}")]
    SimulatedFault {
        /// Type of simulated fault
        fault_type: String,
    },

    /// The fetch was cancelled before completing
    #[error("fetch cancelled")]
    Cancelled,

    /// The response could not be decoded into an envelope
    #[error("malformed response: {message}")]
    Malformed {
        /// Decoding error message
        message: String,
    },
}

impl FetchError {
    /// Create a remote error.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a simulated fault error.
    #[must_use]
    pub fn simulated_fault(fault_type: impl Into<String>) -> Self {
        Self::SimulatedFault {
            fault_type: fault_type.into(),
        }
    }

    /// Create a malformed-response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connection { .. } | Self::SimulatedFault { .. }
        )
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Result type for fetches.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::timeout(500).is_transient());
        assert!(FetchError::connection("refused").is_transient());
        assert!(!FetchError::remote("403").is_transient());
        assert!(!FetchError::malformed("eof").is_transient());
        assert!(!FetchError::Cancelled.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(FetchError::timeout(30).to_string(), "timeout after 30ms");
        assert_eq!(
            FetchError::simulated_fault("fetch_timeout").to_string(),
            "simulated fault: fetch_timeout"
        );
    }
}
