//! Pagination - Cursors and the session-wide cursor cache
//!
//! `TigerStyle`: `total_pages = ceil(total_records / page_size)` and
//! `page_size >= 1` hold for every cursor built through this module.

mod cache;
mod cursor;

pub use cache::{signature_for, CursorCache};
pub use cursor::{compute_total, Pagination};
