//! Query - Filter, sort and request building
//!
//! `TigerStyle`: One set of matching rules. `LocalFilter` and
//! `SortBy::compare` evaluate the exact structures that are serialized into
//! a `Request`, so cached browsing and server search agree.

mod filter;
mod request;
mod sort;

pub use filter::{Clause, Condition, FilterBy, LocalFilter, TermPredicate};
pub use request::{build_request, PageRequest, Request};
pub use sort::{SortBy, SortDirection};
