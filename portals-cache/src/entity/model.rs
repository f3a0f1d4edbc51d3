//! Entity - Cached instance of a remote Portals object
//!
//! `TigerStyle`: Explicit fields, derived fields recomputed in one place,
//! builder pattern.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::kind::EntityKind;
use super::normalize::{ansi, slug};
use crate::constants::{ENTITY_ID_BYTES_MAX, ENTITY_TITLE_BYTES_MAX};

/// Shared handle to a registered entity.
///
/// The registry hands out clones of the same `Arc`; updates mutate the
/// instance behind the lock, so every holder observes them.
pub type EntityRef = Arc<RwLock<Entity>>;

// =============================================================================
// Entity
// =============================================================================

/// A cached entity of any kind.
///
/// Only the fields needed for tree and pagination behaviour are typed;
/// everything else the server sends lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identity, unique within the kind's registry
    pub id: String,
    /// Kind of entity
    pub kind: EntityKind,
    /// Parent identity; `None` for roots
    pub parent_id: Option<String>,
    /// Position among siblings
    pub order_index: Option<i64>,
    /// Display title
    pub title: String,
    /// Lower-cased, diacritic-stripped title used for term matching
    pub ansi_title: String,
    /// Direct children supplied by the server, if any
    pub children_ids: Option<Vec<String>>,
    /// Creation time on the server
    pub created: Option<DateTime<Utc>>,
    /// Last modification time on the server
    pub last_modified: Option<DateTime<Utc>>,
    /// Route URI encoding kind, title slug and identity
    pub route_uri: String,
    /// Remaining domain fields, keyed by their wire name
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Create an entity with the required fields.
    ///
    /// # Panics
    /// Panics if the ID is empty or either ID or title exceed their limits.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::builder(kind, id, title).build()
    }

    /// Create a builder for more complex construction.
    #[must_use]
    pub fn builder(
        kind: EntityKind,
        id: impl Into<String>,
        title: impl Into<String>,
    ) -> EntityBuilder {
        EntityBuilder::new(kind, id.into(), title.into())
    }

    /// Parent identity, treating an empty string as root.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether this entity has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id().is_none()
    }

    /// Get a domain field.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read any field by its wire name, typed fields included.
    ///
    /// Used by equality clauses, so local filtering and the remote query
    /// address fields the same way.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "ID" => Some(Value::String(self.id.clone())),
            "ParentID" => self.parent_id().map(|id| Value::String(id.to_string())),
            "OrderIndex" => self.order_index.map(Value::from),
            "Title" => Some(Value::String(self.title.clone())),
            "Created" => self.created.map(|t| Value::String(t.to_rfc3339())),
            "LastModified" => self.last_modified.map(|t| Value::String(t.to_rfc3339())),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Recompute every derived field from the base fields.
    pub fn refresh_derived(&mut self) {
        self.ansi_title = ansi(&self.title);
        self.route_uri = format!(
            "/portals/{}/{}/{}",
            self.kind.route_segment(),
            slug(&self.ansi_title),
            self.id
        );
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn into_ref(self) -> EntityRef {
        Arc::new(RwLock::new(self))
    }
}

// =============================================================================
// Entity Builder
// =============================================================================

/// Builder for `Entity` with fluent API.
#[derive(Debug)]
pub struct EntityBuilder {
    kind: EntityKind,
    id: String,
    title: String,
    parent_id: Option<String>,
    order_index: Option<i64>,
    children_ids: Option<Vec<String>>,
    created: Option<DateTime<Utc>>,
    last_modified: Option<DateTime<Utc>>,
    fields: Map<String, Value>,
}

impl EntityBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(kind: EntityKind, id: String, title: String) -> Self {
        Self {
            kind,
            id,
            title,
            parent_id: None,
            order_index: None,
            children_ids: None,
            created: None,
            last_modified: None,
            fields: Map::new(),
        }
    }

    /// Set the parent; an empty string means root.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        let parent_id = parent_id.into();
        self.parent_id = (!parent_id.is_empty()).then_some(parent_id);
        self
    }

    /// Set the sibling position.
    #[must_use]
    pub fn with_order_index(mut self, order_index: i64) -> Self {
        self.order_index = Some(order_index);
        self
    }

    /// Set the explicit children list.
    #[must_use]
    pub fn with_children_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.children_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Set creation time.
    #[must_use]
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Set last modification time.
    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Add a domain field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build the entity.
    ///
    /// # Panics
    /// Panics if the ID is empty or either ID or title exceed their limits.
    #[must_use]
    pub fn build(self) -> Entity {
        // Preconditions
        assert!(!self.id.is_empty(), "entity must have id");
        assert!(
            self.id.len() <= ENTITY_ID_BYTES_MAX,
            "id {} bytes exceeds max {}",
            self.id.len(),
            ENTITY_ID_BYTES_MAX
        );
        assert!(
            self.title.len() <= ENTITY_TITLE_BYTES_MAX,
            "title {} bytes exceeds max {}",
            self.title.len(),
            ENTITY_TITLE_BYTES_MAX
        );

        let mut entity = Entity {
            id: self.id,
            kind: self.kind,
            parent_id: self.parent_id,
            order_index: self.order_index,
            title: self.title,
            ansi_title: String::new(),
            children_ids: self.children_ids,
            created: self.created,
            last_modified: self.last_modified,
            route_uri: String::new(),
            fields: self.fields,
        };
        entity.refresh_derived();
        entity
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_new_derives_fields() {
        let entity = Entity::new(EntityKind::Category, "x1", "Cat A");

        assert_eq!(entity.ansi_title, "cat a");
        assert_eq!(entity.route_uri, "/portals/categories/cat-a/x1");
        assert!(entity.is_root());
        assert!(entity.children_ids.is_none());
    }

    #[test]
    fn test_builder_empty_parent_is_root() {
        let entity = Entity::builder(EntityKind::Category, "x1", "A")
            .with_parent("")
            .build();
        assert!(entity.is_root());

        let child = Entity::builder(EntityKind::Category, "c1", "B")
            .with_parent("x1")
            .with_order_index(3)
            .build();
        assert_eq!(child.parent_id(), Some("x1"));
        assert_eq!(child.order_index, Some(3));
    }

    #[test]
    fn test_field_reads_typed_and_domain_fields() {
        let entity = Entity::builder(EntityKind::Content, "n1", "News")
            .with_parent("x1")
            .with_order_index(2)
            .with_field("Status", "Published")
            .build();

        assert_eq!(entity.field("ID"), Some(Value::from("n1")));
        assert_eq!(entity.field("ParentID"), Some(Value::from("x1")));
        assert_eq!(entity.field("OrderIndex"), Some(Value::from(2)));
        assert_eq!(entity.field("Status"), Some(Value::from("Published")));
        assert_eq!(entity.field("Missing"), None);
    }

    #[test]
    #[should_panic(expected = "entity must have id")]
    fn test_empty_id_panics() {
        let _ = Entity::new(EntityKind::Role, "", "Admins");
    }
}
