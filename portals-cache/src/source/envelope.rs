//! Envelope - One page of a list/search response

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FetchResult;
use crate::pagination::Pagination;

/// Response page: raw objects plus the cursor totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    /// Raw transfer objects, normalized by the receiver
    #[serde(default)]
    pub objects: Vec<Value>,
    /// Totals for the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl Envelope {
    /// Build an envelope.
    #[must_use]
    pub fn new(objects: Vec<Value>, pagination: Pagination) -> Self {
        Self {
            objects,
            pagination: Some(pagination),
        }
    }

    /// Decode an envelope from JSON.
    ///
    /// # Errors
    /// Returns `FetchError::Malformed` when the JSON is not an envelope.
    pub fn from_json(json: &Value) -> FetchResult<Self> {
        Ok(Self::deserialize(json)?)
    }
}
