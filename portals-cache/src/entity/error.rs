//! Entity Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Reasons a raw transfer object cannot become an entity.
///
/// A payload that fails to parse is never inserted into a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Payload is not a JSON object
    #[error("payload is not an object")]
    NotAnObject,

    /// Payload has no usable `ID`
    #[error("payload has no ID")]
    MissingId,

    /// A field has the wrong shape
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Wire name of the field
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// Payload identity differs from the instance it was merged onto
    #[error("ID mismatch: expected {expected}, found {found}")]
    IdMismatch {
        /// ID of the existing instance
        expected: String,
        /// ID carried by the payload
        found: String,
    },
}

impl ParseError {
    /// Create an invalid field error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result of normalizing a raw payload.
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_message() {
        let err = ParseError::invalid_field("OrderIndex", "expected a number");
        assert_eq!(err.to_string(), "invalid field OrderIndex: expected a number");
    }
}
