//! `InvalidationBridge` - Applies change events to the registries
//!
//! `TigerStyle`: No I/O. Everything an event needs is either already in a
//! registry or carried by the event payload.

use serde_json::Value;

use super::bus::{EventBus, Subscription};
use super::event::{ChangeEvent, ChangeKind};
use crate::entity::{EntityKind, ParseError};
use crate::registry::{EntityRegistry, Registries};

/// Registry-level result of applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEffect {
    /// The `Object` tag names no known kind
    UnknownObject,
    /// The event concerns an ID the registry never saw and carries no payload
    UnknownId,
    /// Known entity, nothing to merge
    Unchanged,
    /// Entity removed from its registry
    Removed,
    /// Payload merged into the registry
    Upserted,
    /// Entity re-parented
    Moved {
        /// Former parent
        from: Option<String>,
        /// New parent
        to: Option<String>,
    },
    /// Payload rejected by the normalizer
    Rejected(ParseError),
}

/// Subscriber keeping the registries consistent with change events.
#[derive(Debug)]
pub struct InvalidationBridge {
    registries: Registries,
    subscription: Option<Subscription>,
}

impl InvalidationBridge {
    /// Bridge without a subscription; feed it with [`apply`](Self::apply).
    #[must_use]
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            subscription: None,
        }
    }

    /// Bridge subscribed to `bus`.
    #[must_use]
    pub fn subscribe(registries: Registries, bus: &EventBus) -> Self {
        Self {
            registries,
            subscription: Some(bus.subscribe()),
        }
    }

    /// Wait for the next event and apply it.
    ///
    /// Returns `None` when unsubscribed or the bus is gone.
    pub async fn next(&mut self) -> Option<(ChangeEvent, ChangeEffect)> {
        let event = self.subscription.as_mut()?.recv().await?;
        let effect = self.apply(&event);
        Some((event, effect))
    }

    /// Apply every event already published, without waiting.
    pub fn drain(&mut self) -> Vec<(ChangeEvent, ChangeEffect)> {
        let mut applied = Vec::new();
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            let effect = self.apply(&event);
            applied.push((event, effect));
        }
        applied
    }

    /// Stop listening.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Apply one event to the registries.
    #[tracing::instrument(level = "debug", skip(self, event), fields(object = %event.object, id = %event.id, change = ?event.kind))]
    pub fn apply(&self, event: &ChangeEvent) -> ChangeEffect {
        let Some(kind) = event.entity_kind() else {
            tracing::debug!("unknown object tag, ignored");
            return ChangeEffect::UnknownObject;
        };
        let registry = self.registries.for_kind(kind);

        match event.kind {
            ChangeKind::Deleted => Self::apply_deleted(&registry, event),
            ChangeKind::Created | ChangeKind::Updated => Self::apply_upsert(&registry, kind, event),
            ChangeKind::Moved => Self::apply_moved(&registry, kind, event),
        }
    }

    fn apply_deleted(registry: &EntityRegistry, event: &ChangeEvent) -> ChangeEffect {
        let removed = registry.remove(&event.id);
        let parent_id = event
            .parent_id()
            .map(str::to_string)
            .or_else(|| removed.as_ref().and_then(|h| h.read().parent_id().map(str::to_string)));

        if let Some(parent_id) = parent_id {
            unlink_child(registry, &parent_id, &event.id);
        }

        if removed.is_some() {
            ChangeEffect::Removed
        } else {
            ChangeEffect::UnknownId
        }
    }

    fn apply_upsert(registry: &EntityRegistry, kind: EntityKind, event: &ChangeEvent) -> ChangeEffect {
        if event.payload.is_none() {
            return if registry.contains(&event.id) {
                ChangeEffect::Unchanged
            } else {
                ChangeEffect::UnknownId
            };
        }

        let previous = registry
            .get(&event.id)
            .map(|h| h.read().parent_id().map(str::to_string));

        if let Err(err) = merge_payload(registry, event, event.parent_id()) {
            tracing::warn!(kind = %kind, id = %event.id, error = %err, "event payload rejected");
            return ChangeEffect::Rejected(err);
        }

        let parent_id = registry
            .get(&event.id)
            .and_then(|h| h.read().parent_id().map(str::to_string));
        if let Some(parent_id) = parent_id.as_deref() {
            link_child(registry, parent_id, &event.id);
        }

        // A payload carrying a new ParentID re-parents the entity
        match previous {
            Some(from) if from != parent_id => {
                if let Some(from) = from.as_deref() {
                    unlink_child(registry, from, &event.id);
                }
                tracing::debug!(from = ?from, to = ?parent_id, "payload re-parented entity");
                ChangeEffect::Moved { from, to: parent_id }
            }
            _ => ChangeEffect::Upserted,
        }
    }

    fn apply_moved(registry: &EntityRegistry, kind: EntityKind, event: &ChangeEvent) -> ChangeEffect {
        let existing = registry.get(&event.id);
        if existing.is_none() && event.payload.is_none() {
            return ChangeEffect::UnknownId;
        }

        let from = event.old_parent_id().map(str::to_string).or_else(|| {
            existing
                .as_ref()
                .and_then(|h| h.read().parent_id().map(str::to_string))
        });
        let to = event.parent_id().map(str::to_string).or_else(|| {
            event
                .payload
                .as_ref()
                .and_then(|payload| payload.get("ParentID"))
                .and_then(Value::as_str)
                .filter(|id| !id.trim().is_empty())
                .map(|id| id.trim().to_string())
        });

        if event.payload.is_some() {
            if let Err(err) = merge_payload(registry, event, to.as_deref()) {
                tracing::warn!(kind = %kind, id = %event.id, error = %err, "event payload rejected");
                return ChangeEffect::Rejected(err);
            }
        }
        if let Some(handle) = registry.get(&event.id) {
            handle.write().parent_id.clone_from(&to);
        }

        if let Some(from) = from.as_deref() {
            unlink_child(registry, from, &event.id);
        }
        if let Some(to) = to.as_deref() {
            link_child(registry, to, &event.id);
        }

        ChangeEffect::Moved { from, to }
    }
}

/// Merge the event payload, filling `ID` and `ParentID` from the event when
/// the payload omits them.
fn merge_payload(
    registry: &EntityRegistry,
    event: &ChangeEvent,
    parent_id: Option<&str>,
) -> Result<(), ParseError> {
    let Some(payload) = event.payload.as_ref() else {
        return Ok(());
    };

    let mut payload = payload.clone();
    payload
        .entry("ID")
        .or_insert_with(|| Value::String(event.id.clone()));
    if let Some(parent_id) = parent_id {
        payload
            .entry("ParentID")
            .or_insert_with(|| Value::String(parent_id.to_string()));
    }

    registry.update(payload).map(|_| ())
}

/// Remove `child_id` from the parent's explicit children list.
fn unlink_child(registry: &EntityRegistry, parent_id: &str, child_id: &str) {
    if let Some(parent) = registry.get(parent_id) {
        if let Some(ids) = parent.write().children_ids.as_mut() {
            ids.retain(|id| id != child_id);
        }
    }
}

/// Add `child_id` to the parent's explicit children list when it has one.
fn link_child(registry: &EntityRegistry, parent_id: &str, child_id: &str) {
    if parent_id == child_id {
        return;
    }
    if let Some(parent) = registry.get(parent_id) {
        if let Some(ids) = parent.write().children_ids.as_mut() {
            if !ids.iter().any(|id| id == child_id) {
                ids.push(child_id.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use serde_json::json;

    fn registries_with_tree() -> Registries {
        let registries = Registries::new();
        registries
            .for_kind(EntityKind::Category)
            .update(json!({
                "ID": "x1",
                "Title": "Root",
                "Children": [
                    {"ID": "c1", "Title": "B", "OrderIndex": 1},
                    {"ID": "c2", "Title": "A", "OrderIndex": 0}
                ]
            }))
            .unwrap();
        registries
            .for_kind(EntityKind::Category)
            .update(json!({"ID": "x2", "Title": "Other", "ChildrenIDs": []}))
            .unwrap();
        registries
    }

    fn children_ids(registries: &Registries, id: &str) -> Option<Vec<String>> {
        registries
            .for_kind(EntityKind::Category)
            .get(id)
            .and_then(|h| h.read().children_ids.clone())
    }

    #[test]
    fn test_deleted_removes_and_unlinks() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());
        let registry = registries.for_kind(EntityKind::Category);

        let event = ChangeEvent::deleted(EntityKind::Category, "c1").with_parent("x1");
        assert_eq!(bridge.apply(&event), ChangeEffect::Removed);

        assert!(!registry.contains("c1"));
        assert_eq!(children_ids(&registries, "x1"), Some(vec!["c2".to_string()]));
        let x1 = registry.get("x1").unwrap().read().clone();
        let children = Tree::new(&registry).children(&x1);
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn test_deleted_uses_own_parent_when_event_has_none() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());

        bridge.apply(&ChangeEvent::deleted(EntityKind::Category, "c2"));
        assert_eq!(children_ids(&registries, "x1"), Some(vec!["c1".to_string()]));
    }

    #[test]
    fn test_unknown_object_and_id_are_noops() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());
        let before = registries.total_len();

        let unknown_object = ChangeEvent {
            object: "Spaceship".to_string(),
            ..ChangeEvent::deleted(EntityKind::Category, "c1")
        };
        assert_eq!(bridge.apply(&unknown_object), ChangeEffect::UnknownObject);
        assert_eq!(
            bridge.apply(&ChangeEvent::deleted(EntityKind::Category, "nope")),
            ChangeEffect::UnknownId
        );
        assert_eq!(
            bridge.apply(&ChangeEvent::updated(EntityKind::Category, "nope")),
            ChangeEffect::UnknownId
        );
        assert_eq!(registries.total_len(), before);
    }

    #[test]
    fn test_created_merges_and_links() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());

        let event = ChangeEvent::created(EntityKind::Category, "c3")
            .with_parent("x1")
            .with_payload(json!({"Title": "New", "OrderIndex": 5}));
        assert_eq!(bridge.apply(&event), ChangeEffect::Upserted);

        let c3 = registries.for_kind(EntityKind::Category).get("c3").unwrap();
        assert_eq!(c3.read().parent_id(), Some("x1"));
        assert_eq!(
            children_ids(&registries, "x1"),
            Some(vec!["c1".to_string(), "c2".to_string(), "c3".to_string()])
        );
    }

    #[test]
    fn test_updated_keeps_identity() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());
        let c1 = registries.for_kind(EntityKind::Category).get("c1").unwrap();

        let event = ChangeEvent::updated(EntityKind::Category, "c1")
            .with_payload(json!({"ID": "c1", "Title": "Renamed"}));
        assert_eq!(bridge.apply(&event), ChangeEffect::Upserted);

        assert_eq!(c1.read().title, "Renamed");
        assert_eq!(c1.read().parent_id(), Some("x1"));
    }

    #[test]
    fn test_updated_parent_unlinks_old_parent() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());
        let registry = registries.for_kind(EntityKind::Category);

        let event = ChangeEvent::updated(EntityKind::Category, "c1")
            .with_payload(json!({"ID": "c1", "Title": "B", "ParentID": "x2"}));
        assert_eq!(
            bridge.apply(&event),
            ChangeEffect::Moved {
                from: Some("x1".to_string()),
                to: Some("x2".to_string())
            }
        );

        assert_eq!(children_ids(&registries, "x1"), Some(vec!["c2".to_string()]));
        assert_eq!(children_ids(&registries, "x2"), Some(vec!["c1".to_string()]));

        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap().read().clone();
        let x1_children: Vec<String> = tree.children(&x1).iter().map(|h| h.read().id.clone()).collect();
        assert_eq!(x1_children, vec!["c2"]);
    }

    #[test]
    fn test_updated_parent_scan_and_list_agree() {
        let registries = Registries::new();
        let registry = registries.for_kind(EntityKind::Category);
        registry
            .update(json!({"ID": "x1", "Title": "One", "ChildrenIDs": ["c1"]}))
            .unwrap();
        registry.update(json!({"ID": "x2", "Title": "Two"})).unwrap();
        registry
            .update(json!({"ID": "c1", "Title": "Child", "ParentID": "x1"}))
            .unwrap();
        let bridge = InvalidationBridge::new(registries.clone());

        bridge.apply(
            &ChangeEvent::created(EntityKind::Category, "c1").with_payload(json!({"ParentID": "x2"})),
        );

        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap().read().clone();
        let x2 = registry.get("x2").unwrap().read().clone();
        assert!(tree.children(&x1).is_empty());
        let x2_children: Vec<String> = tree.children(&x2).iter().map(|h| h.read().id.clone()).collect();
        assert_eq!(x2_children, vec!["c1"]);
    }

    #[test]
    fn test_rejected_payload() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());

        let event = ChangeEvent::updated(EntityKind::Category, "c1")
            .with_payload(json!({"OrderIndex": "first"}));
        assert!(matches!(bridge.apply(&event), ChangeEffect::Rejected(_)));
        assert_eq!(
            registries.for_kind(EntityKind::Category).get("c1").unwrap().read().order_index,
            Some(1)
        );
    }

    #[test]
    fn test_moved_relinks() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());

        let event = ChangeEvent::moved(EntityKind::Category, "c1", None, Some("x2".to_string()));
        assert_eq!(
            bridge.apply(&event),
            ChangeEffect::Moved {
                from: Some("x1".to_string()),
                to: Some("x2".to_string())
            }
        );

        let c1 = registries.for_kind(EntityKind::Category).get("c1").unwrap();
        assert_eq!(c1.read().parent_id(), Some("x2"));
        assert_eq!(children_ids(&registries, "x1"), Some(vec!["c2".to_string()]));
        assert_eq!(children_ids(&registries, "x2"), Some(vec!["c1".to_string()]));
    }

    #[test]
    fn test_moved_to_root() {
        let registries = registries_with_tree();
        let bridge = InvalidationBridge::new(registries.clone());

        bridge.apply(&ChangeEvent::moved(EntityKind::Category, "c2", Some("x1".to_string()), None));

        let c2 = registries.for_kind(EntityKind::Category).get("c2").unwrap();
        assert!(c2.read().is_root());
        assert_eq!(children_ids(&registries, "x1"), Some(vec!["c1".to_string()]));
    }

    #[tokio::test]
    async fn test_subscribed_bridge() {
        let registries = registries_with_tree();
        let bus = EventBus::new(16);
        let mut bridge = InvalidationBridge::subscribe(registries.clone(), &bus);

        bus.publish(ChangeEvent::deleted(EntityKind::Category, "c1").with_parent("x1"));
        let (event, effect) = bridge.next().await.unwrap();
        assert_eq!(event.id, "c1");
        assert_eq!(effect, ChangeEffect::Removed);

        bus.publish(ChangeEvent::deleted(EntityKind::Category, "c2"));
        bus.publish(ChangeEvent::deleted(EntityKind::Category, "c2"));
        let effects: Vec<ChangeEffect> = bridge.drain().into_iter().map(|(_, e)| e).collect();
        assert_eq!(effects, vec![ChangeEffect::Removed, ChangeEffect::UnknownId]);

        bridge.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bridge.next().await.is_none());
    }
}
