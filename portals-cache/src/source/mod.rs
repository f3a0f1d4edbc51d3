//! Source - Remote fetch contract and its simulated implementation
//!
//! `TigerStyle`: The cache depends only on the `EntitySource` trait. Tests
//! and the DST harness use `SimEntitySource`.

mod backend;
mod envelope;
mod error;
mod sim;

pub use backend::EntitySource;
pub use envelope::Envelope;
pub use error::{FetchError, FetchResult};
pub use sim::SimEntitySource;
