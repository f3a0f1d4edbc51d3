//! Registry - Session-scoped identity maps, one per entity kind
//!
//! `TigerStyle`: Explicit lifetime. A `Registries` value is created once per
//! application session and cloned into every component that needs it; there
//! is no hidden global state.

mod store;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entity::EntityKind;

pub use store::{EntityRegistry, Incoming};

/// The set of registries of one session, keyed by kind.
///
/// Registries are created lazily on first use. Cheap to clone; clones share
/// the same registries.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    inner: Arc<RwLock<HashMap<EntityKind, EntityRegistry>>>,
}

impl Registries {
    /// Create an empty registry set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for `kind`, created on first use.
    #[must_use]
    pub fn for_kind(&self, kind: EntityKind) -> EntityRegistry {
        if let Some(registry) = self.inner.read().get(&kind) {
            return registry.clone();
        }
        self.inner
            .write()
            .entry(kind)
            .or_insert_with(|| EntityRegistry::new(kind))
            .clone()
    }

    /// Registry for `kind` if it was ever used.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<EntityRegistry> {
        self.inner.read().get(&kind).cloned()
    }

    /// Total number of entities across kinds.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.inner.read().values().map(EntityRegistry::len).sum()
    }
}
