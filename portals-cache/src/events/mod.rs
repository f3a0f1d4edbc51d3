//! Events - Push invalidation
//!
//! `TigerStyle`: Two levels. `InvalidationBridge::apply` keeps registries
//! consistent once per event; each `SearchController::handle_change` then
//! re-derives its own visible list from the updated registry.
//!
//! ```text
//! publish ──► EventBus ──► InvalidationBridge::apply ──► Registry
//!                     └──► SearchController::handle_change ──► visible / results
//! ```

mod bridge;
mod bus;
mod event;

pub use bridge::{ChangeEffect, InvalidationBridge};
pub use bus::{EventBus, Subscription};
pub use event::{ChangeEvent, ChangeKind};
