//! Request - Wire request composed from filter, sort and page
//!
//! `TigerStyle`: Pure construction, no I/O.

use serde::Serialize;

use super::filter::FilterBy;
use super::sort::SortBy;
use crate::constants::PAGINATION_PAGE_SIZE_MAX;

/// Page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageRequest {
    /// 1-based page number
    pub page_number: usize,
    /// Records per page
    pub page_size: usize,
}

impl PageRequest {
    /// Create a page request.
    ///
    /// # Panics
    /// Panics if `page_number` is zero or `page_size` is out of range.
    #[must_use]
    pub fn new(page_number: usize, page_size: usize) -> Self {
        // Preconditions
        assert!(page_number >= 1, "page_number must be >= 1");
        assert!(
            (1..=PAGINATION_PAGE_SIZE_MAX).contains(&page_size),
            "page_size must be in [1, {PAGINATION_PAGE_SIZE_MAX}], got {page_size}"
        );

        Self {
            page_number,
            page_size,
        }
    }

    /// Zero-based offset of the first record of the page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page_number - 1) * self.page_size
    }
}

/// A list/search request as sent to the remote source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    /// Filter
    pub filter_by: FilterBy,
    /// Ordered sort terms; omitted when empty
    #[serde(skip_serializing_if = "SortBy::is_empty")]
    pub sort_by: SortBy,
    /// Page; omitted for unpaged requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageRequest>,
}

impl Request {
    /// Same filter and sort, another page.
    #[must_use]
    pub fn with_page(&self, page: PageRequest) -> Self {
        Self {
            filter_by: self.filter_by.clone(),
            sort_by: self.sort_by.clone(),
            pagination: Some(page),
        }
    }
}

/// Compose a request.
#[must_use]
pub fn build_request(
    filter_by: FilterBy,
    sort_by: SortBy,
    pagination: Option<PageRequest>,
) -> Request {
    Request {
        filter_by,
        sort_by,
        pagination,
    }
}
