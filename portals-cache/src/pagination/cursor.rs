//! Pagination - Page bookkeeping for one query

use serde::{Deserialize, Serialize};

use crate::constants::PAGINATION_PAGE_SIZE_DEFAULT;
use crate::source::Envelope;

/// Cursor state of one query.
///
/// `page_number` is the last fetched page (0 before the first fetch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pagination {
    /// Matching records on the server
    #[serde(default)]
    pub total_records: usize,
    /// `ceil(total_records / page_size)`
    #[serde(default)]
    pub total_pages: usize,
    /// Records per page, at least 1
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Last fetched page
    #[serde(default)]
    pub page_number: usize,
}

fn default_page_size() -> usize {
    PAGINATION_PAGE_SIZE_DEFAULT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            total_records: 0,
            total_pages: 0,
            page_size: PAGINATION_PAGE_SIZE_DEFAULT,
            page_number: 0,
        }
    }
}

impl Pagination {
    /// Cursor from raw totals, with `total_pages` derived.
    ///
    /// A zero page size is raised to 1.
    #[must_use]
    pub fn from_totals(total_records: usize, page_size: usize, page_number: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            total_records,
            total_pages: total_records.div_ceil(page_size),
            page_size,
            page_number,
        }
    }

    /// Cursor carried by a response envelope, or the zeroed default.
    #[must_use]
    pub fn get_default(envelope: Option<&Envelope>) -> Self {
        envelope
            .and_then(|envelope| envelope.pagination)
            .map(|p| Self::from_totals(p.total_records, p.page_size, p.page_number))
            .unwrap_or_default()
    }

    /// Records shown after the last fetched page.
    #[must_use]
    pub fn loaded(&self) -> usize {
        compute_total(self.page_number, self)
    }

    /// Whether every page has been fetched.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.page_number >= self.total_pages
    }

    /// Page to fetch next.
    #[must_use]
    pub fn next_page(&self) -> usize {
        self.page_number + 1
    }
}

/// Records rendered after `page_number` pages:
/// `min(page_number * page_size, total_records)`.
#[must_use]
pub fn compute_total(page_number: usize, pagination: &Pagination) -> usize {
    page_number
        .saturating_mul(pagination.page_size)
        .min(pagination.total_records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compute_total_caps_at_total_records() {
        let pagination = Pagination::from_totals(25, 10, 1);

        assert_eq!(pagination.total_pages, 3);
        assert_eq!(compute_total(1, &pagination), 10);
        assert_eq!(compute_total(3, &pagination), 25);
        assert_eq!(compute_total(usize::MAX, &pagination), 25);
    }

    #[test]
    fn test_compute_total_monotonic() {
        for (records, size) in [(0, 1), (7, 3), (100, 10), (101, 10)] {
            let pagination = Pagination::from_totals(records, size, 0);
            let mut previous = 0;
            for page in 0..20 {
                let total = compute_total(page, &pagination);
                assert!(total <= records);
                assert!(total >= previous);
                previous = total;
            }
        }
    }

    #[test]
    fn test_get_default_without_envelope() {
        let pagination = Pagination::get_default(None);

        assert_eq!(pagination.page_size, PAGINATION_PAGE_SIZE_DEFAULT);
        assert_eq!(pagination.total_records, 0);
        assert_eq!(pagination.page_number, 0);
    }

    #[test]
    fn test_get_default_recomputes_total_pages() {
        let envelope = Envelope::from_json(&json!({
            "Objects": [],
            "Pagination": {"TotalRecords": 25, "TotalPages": 99, "PageSize": 10, "PageNumber": 1}
        }))
        .unwrap();

        let pagination = Pagination::get_default(Some(&envelope));
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.page_number, 1);
    }

    #[test]
    fn test_exhaustion() {
        let mut pagination = Pagination::from_totals(25, 10, 2);
        assert!(!pagination.is_exhausted());
        assert_eq!(pagination.next_page(), 3);

        pagination.page_number = 3;
        assert!(pagination.is_exhausted());
        assert_eq!(pagination.loaded(), 25);
    }

    #[test]
    fn test_zero_page_size_raised() {
        let pagination = Pagination::from_totals(5, 0, 0);
        assert_eq!(pagination.page_size, 1);
        assert_eq!(pagination.total_pages, 5);
    }
}
