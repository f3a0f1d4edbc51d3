//! SortBy - Ordered sort specification
//!
//! Serialized as an ordered JSON object (`{"OrderIndex": "Ascending", ...}`)
//! and also evaluated locally with the same field names.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::entity::Entity;

/// Direction of one sort term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

impl SortDirection {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Ordered list of `(field, direction)` terms; earlier terms win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortBy {
    terms: Vec<(String, SortDirection)>,
}

impl SortBy {
    /// Empty sort (server default order).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `OrderIndex` ascending, then `Title` ascending.
    ///
    /// The common ordering for nested tree listings.
    #[must_use]
    pub fn tree_default() -> Self {
        Self::new().ascending("OrderIndex").ascending("Title")
    }

    /// Append an ascending term.
    #[must_use]
    pub fn ascending(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Ascending)
    }

    /// Append a descending term.
    #[must_use]
    pub fn descending(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Descending)
    }

    /// Append a term; a field already present keeps its first position.
    #[must_use]
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        if !self.terms.iter().any(|(existing, _)| *existing == field) {
            self.terms.push((field, direction));
        }
        self
    }

    /// The terms in precedence order.
    #[must_use]
    pub fn terms(&self) -> &[(String, SortDirection)] {
        &self.terms
    }

    /// Whether no term is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Compare two entities by the terms, falling back to `ID` so the order
    /// is total.
    #[must_use]
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        self.terms
            .iter()
            .map(|(field, direction)| direction.apply(sort_key(a, field).cmp(&sort_key(b, field))))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

impl Serialize for SortBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.terms.len()))?;
        for (field, direction) in &self.terms {
            map.serialize_entry(field, direction)?;
        }
        map.end()
    }
}

// =============================================================================
// Sort keys
// =============================================================================

/// Comparable projection of a field.
///
/// Absent values sort first; values of different shapes order by shape.
#[derive(Debug, Clone)]
enum SortKey {
    Missing,
    Number(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
            Self::Time(_) => 3,
        }
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn sort_key(entity: &Entity, field: &str) -> SortKey {
    match field {
        "OrderIndex" => entity
            .order_index
            .map_or(SortKey::Missing, |i| SortKey::Number(i as f64)),
        "Title" => SortKey::Text(entity.title.to_lowercase()),
        "Created" => entity.created.map_or(SortKey::Missing, SortKey::Time),
        "LastModified" => entity.last_modified.map_or(SortKey::Missing, SortKey::Time),
        _ => match entity.field(field) {
            Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
            Some(Value::String(s)) => SortKey::Text(s.to_lowercase()),
            Some(Value::Bool(b)) => SortKey::Number(f64::from(u8::from(b))),
            _ => SortKey::Missing,
        },
    }
}
