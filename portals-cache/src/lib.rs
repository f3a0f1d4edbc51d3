//! # Portals Cache
//!
//! Client-side entity cache for a Portals management client.
//!
//! `TigerStyle`: Registry first. Every object fetched from the remote service
//! lands in a per-kind identity map; trees, browse lists and change
//! invalidation are all derived from that one live copy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  SearchController (one per open list)                    │
//! │    browse: derive from registry ─┐   search: server pages │
//! ├──────────────────────────────────┼───────────────────────┤
//! │  Registries (identity maps)  ◄───┘   CursorCache          │
//! │  Tree (parent / children / FullTitle)                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  EntitySource (remote)   │  EventBus ─► InvalidationBridge│
//! ├──────────────────────────────────────────────────────────┤
//! │  DST: SimEntitySource + FaultInjector                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use portals_cache::dst::{SimConfig, Simulation};
//! use portals_cache::entity::EntityKind;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let env = Simulation::new(SimConfig::with_seed(42)).build();
//!     env.source.insert(EntityKind::Category, json!({"ID": "c1", "Title": "News"}));
//!
//!     let mut view = env.controller(EntityKind::Category);
//!     view.open();
//!     view.settle().await;
//!     assert_eq!(view.visible().len(), 1);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod dst;
pub mod entity;
pub mod events;
pub mod pagination;
pub mod query;
pub mod registry;
pub mod source;
pub mod telemetry;
pub mod tree;
pub mod view;

// Re-export common types
pub use config::{CacheConfig, ConfigError};
pub use constants::*;
pub use dst::{
    create_simulation, DeterministicRng, FaultConfig, FaultInjector, FaultType, SimConfig,
    SimEnvironment, Simulation,
};
pub use entity::{Entity, EntityBuilder, EntityKind, EntityRef, ParseError};
pub use events::{ChangeEffect, ChangeEvent, ChangeKind, EventBus, InvalidationBridge, Subscription};
pub use pagination::{CursorCache, Pagination};
pub use query::{Clause, FilterBy, Request, SortBy, SortDirection};
pub use registry::{EntityRegistry, Registries};
pub use source::{EntitySource, Envelope, FetchError, FetchResult, SimEntitySource};
pub use telemetry::{init_tracing, TelemetryConfig};
pub use tree::Tree;
pub use view::{ListScope, ScrollOutcome, SearchController, ViewMode, ViewUpdate};
