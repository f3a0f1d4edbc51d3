//! FilterBy - Term query plus field clauses
//!
//! The same matching rules run locally against the registry and remotely on
//! the server: whatever a browse view shows from cache is what the server
//! would return for the same request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::QUERY_TERMS_COUNT_MAX;
use crate::entity::{ansi, Entity};

// =============================================================================
// Clauses
// =============================================================================

/// Condition applied to one field.
///
/// Serializes as `{"Equals": value}` or the bare string `"IsNull"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Field equals the literal value
    Equals(Value),
    /// Field is absent, null, or an empty string
    IsNull,
}

/// A single-field clause, serialized as `{"<Field>": <Condition>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Condition>",
    into = "BTreeMap<String, Condition>"
)]
pub struct Clause {
    /// Wire name of the field
    pub field: String,
    /// Condition on it
    pub condition: Condition,
}

impl Clause {
    /// `field == value`.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Equals(value.into()),
        }
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::IsNull,
        }
    }

    /// Evaluate against an entity.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        let value = entity.field(&self.field);
        match &self.condition {
            Condition::Equals(expected) => value.as_ref() == Some(expected),
            Condition::IsNull => match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            },
        }
    }

    /// Canonical text form used in cursor signatures.
    #[must_use]
    pub fn canonical(&self) -> String {
        match &self.condition {
            Condition::Equals(value) => format!("{}={value}", self.field),
            Condition::IsNull => format!("{}=null", self.field),
        }
    }
}

impl TryFrom<BTreeMap<String, Condition>> for Clause {
    type Error = String;

    fn try_from(map: BTreeMap<String, Condition>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("clause must have exactly one field, got {}", map.len()));
        }
        map.into_iter()
            .next()
            .map(|(field, condition)| Self { field, condition })
            .ok_or_else(|| "empty clause".to_string())
    }
}

impl From<Clause> for BTreeMap<String, Condition> {
    fn from(clause: Clause) -> Self {
        BTreeMap::from([(clause.field, clause.condition)])
    }
}

// =============================================================================
// FilterBy
// =============================================================================

/// Filter part of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterBy {
    /// Free-text term query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Clauses that must all hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<Clause>,
}

impl FilterBy {
    /// Empty filter (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the term query; blank queries clear it.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.trim().is_empty()).then_some(query);
        self
    }

    /// Add a clause.
    #[must_use]
    pub fn and(mut self, clause: Clause) -> Self {
        self.and.push(clause);
        self
    }

    /// Whether the filter constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.is_none() && self.and.is_empty()
    }
}

// =============================================================================
// Term predicate
// =============================================================================

/// Compiled free-text query.
///
/// Terms split on whitespace; a `+` prefix makes a term required. A title
/// matches when it contains every required term and at least one term of
/// the whole set (required terms included). An empty query matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermPredicate {
    required: Vec<String>,
    optional: Vec<String>,
}

impl TermPredicate {
    /// Compile a query string.
    ///
    /// ```
    /// use portals_cache::query::TermPredicate;
    /// let predicate = TermPredicate::parse("+alpha beta");
    /// assert!(predicate.matches("alpha"));
    /// assert!(!predicate.matches("beta"));
    /// ```
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut predicate = Self::default();
        for token in query.split_whitespace().take(QUERY_TERMS_COUNT_MAX) {
            match token.strip_prefix('+') {
                Some(term) => {
                    let term = ansi(term);
                    if !term.is_empty() {
                        predicate.required.push(term);
                    }
                }
                None => predicate.optional.push(ansi(token)),
            }
        }
        predicate
    }

    /// Whether no term was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }

    /// Evaluate against an ANSI-normalized title.
    #[must_use]
    pub fn matches(&self, ansi_title: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        self.required.iter().all(|term| ansi_title.contains(term.as_str()))
            && self
                .required
                .iter()
                .chain(&self.optional)
                .any(|term| ansi_title.contains(term.as_str()))
    }

    /// Canonical text form used in cursor signatures.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut terms: Vec<String> = self
            .required
            .iter()
            .map(|term| format!("+{term}"))
            .chain(self.optional.iter().cloned())
            .collect();
        terms.sort();
        terms.dedup();
        terms.join(" ")
    }
}

// =============================================================================
// Local filter
// =============================================================================

/// A `FilterBy` compiled for repeated local evaluation.
#[derive(Debug, Clone, Default)]
pub struct LocalFilter {
    terms: TermPredicate,
    clauses: Vec<Clause>,
}

impl LocalFilter {
    /// Compile a filter.
    #[must_use]
    pub fn new(filter: &FilterBy) -> Self {
        Self {
            terms: filter
                .query
                .as_deref()
                .map(TermPredicate::parse)
                .unwrap_or_default(),
            clauses: filter.and.clone(),
        }
    }

    /// Evaluate against an entity.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.terms.matches(&entity.ansi_title)
            && self.clauses.iter().all(|clause| clause.matches(entity))
    }
}
