//! `ChangeEvent` - Push notification about one entity

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{EntityKind, RawObject};

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// First seen on the server
    Created,
    /// Fields changed
    Updated,
    /// Gone
    Deleted,
    /// Parent changed
    Moved,
}

/// A change notification.
///
/// Wire shape: `{"Object", "Type", "ID", "ParentID"?, "OldParentID"?, "Data"?}`.
/// `Object` is the kind tag, optionally qualified (`"Portals.Category"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Kind tag of the entity
    #[serde(rename = "Object")]
    pub object: String,
    /// What happened
    #[serde(rename = "Type")]
    pub kind: ChangeKind,
    /// Entity identity
    #[serde(rename = "ID")]
    pub id: String,
    /// Current (new) parent
    #[serde(rename = "ParentID", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Former parent of a moved entity
    #[serde(rename = "OldParentID", default, skip_serializing_if = "Option::is_none")]
    pub old_parent_id: Option<String>,
    /// Full entity payload, merged through the normalizer
    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<RawObject>,
}

impl ChangeEvent {
    fn new(kind: EntityKind, change: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            object: kind.as_str().to_string(),
            kind: change,
            id: id.into(),
            parent_id: None,
            old_parent_id: None,
            payload: None,
        }
    }

    /// `Created` notification.
    #[must_use]
    pub fn created(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, ChangeKind::Created, id)
    }

    /// `Updated` notification.
    #[must_use]
    pub fn updated(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, ChangeKind::Updated, id)
    }

    /// `Deleted` notification.
    #[must_use]
    pub fn deleted(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, ChangeKind::Deleted, id)
    }

    /// `Moved` notification from `old_parent_id` to `parent_id`.
    #[must_use]
    pub fn moved(
        kind: EntityKind,
        id: impl Into<String>,
        old_parent_id: Option<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            old_parent_id,
            parent_id,
            ..Self::new(kind, ChangeKind::Moved, id)
        }
    }

    /// Set the parent.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Attach a payload; non-object values are ignored.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        if let Value::Object(object) = payload {
            self.payload = Some(object);
        }
        self
    }

    /// Kind named by the `Object` tag, if known.
    #[must_use]
    pub fn entity_kind(&self) -> Option<EntityKind> {
        EntityKind::from_tag(&self.object)
    }

    /// Current parent, treating an empty string as none.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Former parent, treating an empty string as none.
    #[must_use]
    pub fn old_parent_id(&self) -> Option<&str> {
        self.old_parent_id.as_deref().filter(|id| !id.is_empty())
    }
}
