//! `EntityRegistry` - Identity map for one entity kind
//!
//! `TigerStyle`: One live instance per ID. Upserts replace the contents behind
//! an existing handle instead of the handle itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::entity::{normalize, Entity, EntityKind, EntityRef, ParseResult, RawObject};

/// Input accepted by [`EntityRegistry::update`].
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Already typed entity, stored as is
    Typed(Entity),
    /// Raw transfer object, normalized against any existing instance
    Raw(Value),
}

impl From<Entity> for Incoming {
    fn from(entity: Entity) -> Self {
        Self::Typed(entity)
    }
}

impl From<Value> for Incoming {
    fn from(raw: Value) -> Self {
        Self::Raw(raw)
    }
}

impl From<RawObject> for Incoming {
    fn from(raw: RawObject) -> Self {
        Self::Raw(Value::Object(raw))
    }
}

/// In-memory identity map for a single kind.
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    kind: EntityKind,
    entries: Arc<RwLock<HashMap<String, EntityRef>>>,
}

impl EntityRegistry {
    /// Create an empty registry for `kind`.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Kind of entity this registry holds.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Get the live instance for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<EntityRef> {
        self.entries.read().get(id).cloned()
    }

    /// Whether an instance exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Store a typed entity; `None` is a no-op.
    ///
    /// When an instance already exists for the ID its contents are replaced
    /// and the existing handle is returned.
    ///
    /// # Panics
    /// Panics if the entity belongs to another kind.
    pub fn set(&self, entity: Option<Entity>) -> Option<EntityRef> {
        entity.map(|entity| self.store(entity))
    }

    /// Upsert a typed entity or a raw payload.
    ///
    /// Raw payloads are normalized against the existing instance (fields
    /// absent from the payload are kept). Nested children carried by the
    /// payload are upserted too; a malformed nested child is skipped with a
    /// warning.
    ///
    /// # Errors
    /// Returns the `ParseError` of a malformed payload; nothing is stored in
    /// that case.
    ///
    /// # Panics
    /// Panics if a typed entity belongs to another kind.
    #[tracing::instrument(level = "trace", skip(self, incoming), fields(kind = %self.kind))]
    pub fn update(&self, incoming: impl Into<Incoming>) -> ParseResult<EntityRef> {
        let raw = match incoming.into() {
            Incoming::Typed(entity) => return Ok(self.store(entity)),
            Incoming::Raw(raw) => raw,
        };

        let existing = raw
            .get("ID")
            .and_then(Value::as_str)
            .and_then(|id| self.get(id.trim()));

        let normalized = {
            let current = existing.as_ref().map(|handle| handle.read());
            normalize(self.kind, &raw, current.as_deref())?
        };

        let handle = self.store(normalized.entity);

        for child in normalized.nested {
            if let Err(err) = self.update(child) {
                tracing::warn!(kind = %self.kind, error = %err, "nested child rejected");
            }
        }

        Ok(handle)
    }

    /// Remove the instance for `id`.
    pub fn remove(&self, id: &str) -> Option<EntityRef> {
        self.entries.write().remove(id)
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All registered IDs, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// All registered instances, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<EntityRef> {
        self.entries.read().values().cloned().collect()
    }

    /// Instances matching `predicate`, in no particular order.
    pub fn find(&self, predicate: impl Fn(&Entity) -> bool) -> Vec<EntityRef> {
        self.entries
            .read()
            .values()
            .filter(|handle| predicate(&handle.read()))
            .cloned()
            .collect()
    }

    /// Drop every instance.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn store(&self, entity: Entity) -> EntityRef {
        // Precondition
        assert_eq!(
            entity.kind, self.kind,
            "entity kind must match registry kind"
        );

        let mut entries = self.entries.write();
        if let Some(handle) = entries.get(&entity.id) {
            *handle.write() = entity;
            return Arc::clone(handle);
        }

        let id = entity.id.clone();
        let handle = entity.into_ref();
        entries.insert(id, Arc::clone(&handle));
        handle
    }
}

// =============================================================================
// Tests
// =============================================================================
