//! Entity - Typed model of cached Portals objects
//!
//! `TigerStyle`: One entity struct for every kind; the kind decides which
//! registry owns it.
//!
//! # Architecture
//!
//! ```text
//! raw JSON ──normalize()──► Entity ──Registry::update()──► EntityRef (Arc<RwLock<Entity>>)
//!                 │
//!                 └── nested Children ──► upserted recursively
//! ```

mod error;
mod kind;
mod model;
mod normalize;

pub use error::{ParseError, ParseResult};
pub use kind::EntityKind;
pub use model::{Entity, EntityBuilder, EntityRef};
pub use normalize::{ansi, normalize, slug, Normalized, RawObject};
