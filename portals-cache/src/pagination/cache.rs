//! `CursorCache` - Session-wide map of last-used cursors
//!
//! `TigerStyle`: Keys are deterministic. The same filter and sort always
//! produce the same signature regardless of clause order or query spacing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::cursor::Pagination;
use crate::query::{Request, TermPredicate};

/// Fixed namespace for cursor signatures.
const CURSOR_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x3f, 0x81, 0x0c, 0x52, 0xa7, 0x19, 0x4e, 0x6d, 0x9b, 0x24, 0x5e, 0xc0, 0x71, 0xd8, 0x2a,
    0x96,
]);

/// Canonical signature of a request's filter and sort under `prefix`.
///
/// The query is ANSI-normalized with its terms sorted, `And` clauses are
/// sorted, and sort terms keep their precedence order. Pagination is not
/// part of the signature.
#[must_use]
pub fn signature_for(request: &Request, prefix: &str) -> String {
    let terms = request
        .filter_by
        .query
        .as_deref()
        .map(|query| TermPredicate::parse(query).canonical())
        .unwrap_or_default();

    let mut clauses: Vec<String> = request.filter_by.and.iter().map(|c| c.canonical()).collect();
    clauses.sort();

    let sort: Vec<String> = request
        .sort_by
        .terms()
        .iter()
        .map(|(field, direction)| format!("{field}:{}", direction.as_str()))
        .collect();

    let canonical = format!(
        "q={terms}|and={}|sort={}|prefix={prefix}",
        clauses.join(","),
        sort.join(",")
    );
    let id = uuid::Uuid::new_v5(&CURSOR_NAMESPACE, canonical.as_bytes());
    format!("{prefix}:{id}")
}

/// Shared map from signature to the last fetched cursor.
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct CursorCache {
    cursors: Arc<RwLock<HashMap<String, Pagination>>>,
}

impl CursorCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor last stored for `request` under `prefix`.
    #[must_use]
    pub fn get(&self, request: &Request, prefix: &str) -> Option<Pagination> {
        self.get_signature(&signature_for(request, prefix))
    }

    /// Cursor stored under an explicit signature.
    #[must_use]
    pub fn get_signature(&self, signature: &str) -> Option<Pagination> {
        self.cursors.read().get(signature).copied()
    }

    /// Store the cursor of the last fetched page.
    pub fn set(&self, signature: impl Into<String>, pagination: Pagination) {
        self.cursors.write().insert(signature.into(), pagination);
    }

    /// Forget a cursor.
    pub fn remove(&self, signature: &str) -> Option<Pagination> {
        self.cursors.write().remove(signature)
    }

    /// Forget every cursor.
    pub fn clear(&self) {
        self.cursors.write().clear();
    }

    /// Number of cached cursors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{build_request, Clause, FilterBy, PageRequest, SortBy};

    fn request(filter: FilterBy, sort: SortBy) -> Request {
        build_request(filter, sort, None)
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = request(
            FilterBy::new()
                .with_query("news  +Sport")
                .and(Clause::equals("SystemID", "s1"))
                .and(Clause::is_null("ParentID")),
            SortBy::tree_default(),
        );
        let b = request(
            FilterBy::new()
                .with_query("+sport news")
                .and(Clause::is_null("ParentID"))
                .and(Clause::equals("SystemID", "s1")),
            SortBy::tree_default(),
        );

        assert_eq!(signature_for(&a, "portals"), signature_for(&b, "portals"));
    }

    #[test]
    fn test_signature_changes_with_filter_sort_or_prefix() {
        let base = request(FilterBy::new().with_query("news"), SortBy::tree_default());
        let other_query = request(FilterBy::new().with_query("sport"), SortBy::tree_default());
        let other_sort = request(
            FilterBy::new().with_query("news"),
            SortBy::new().descending("LastModified"),
        );
        let swapped_sort = request(
            FilterBy::new().with_query("news"),
            SortBy::new().ascending("Title").ascending("OrderIndex"),
        );

        let signature = signature_for(&base, "portals");
        assert_ne!(signature, signature_for(&other_query, "portals"));
        assert_ne!(signature, signature_for(&other_sort, "portals"));
        assert_ne!(signature, signature_for(&swapped_sort, "portals"));
        assert_ne!(signature, signature_for(&base, "books"));
        assert!(signature.starts_with("portals:"));
    }

    #[test]
    fn test_signature_ignores_page() {
        let base = request(FilterBy::new(), SortBy::new());
        let paged = base.with_page(PageRequest::new(4, 10));

        assert_eq!(signature_for(&base, "p"), signature_for(&paged, "p"));
    }

    #[test]
    fn test_cache_accessors() {
        let cache = CursorCache::new();
        let req = request(FilterBy::new().with_query("x"), SortBy::new());
        let signature = signature_for(&req, "p");

        assert!(cache.get(&req, "p").is_none());

        cache.set(signature.clone(), Pagination::from_totals(25, 10, 2));
        assert_eq!(cache.get(&req, "p").unwrap().page_number, 2);
        assert_eq!(cache.clone().len(), 1);

        assert!(cache.remove(&signature).is_some());
        assert!(cache.is_empty());

        cache.set(signature, Pagination::default());
        cache.clear();
        assert!(cache.is_empty());
    }
}
