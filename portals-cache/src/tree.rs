//! Tree - Parent/children derivation over a flat registry
//!
//! `TigerStyle`: The registry is the arena and `ParentID`/`ChildrenIDs` are
//! indices into it. Every walk is bounded by a visited set and
//! `TREE_DEPTH_COUNT_MAX`, so a malformed parent cycle ends the walk instead
//! of looping.

use std::collections::{HashSet, VecDeque};

use crate::constants::{TREE_DEPTH_COUNT_MAX, TREE_FULL_TITLE_SEPARATOR};
use crate::entity::{Entity, EntityRef};
use crate::query::SortBy;
use crate::registry::EntityRegistry;

/// Tree accessor over one kind's registry.
///
/// # Locking
/// Every method reads entities out of the registry, including the one passed
/// in. Pass an owned snapshot (`handle.read().clone()`), never a live read
/// guard: `parking_lot` read locks are not reentrant once a writer queues.
#[derive(Debug, Clone, Copy)]
pub struct Tree<'a> {
    registry: &'a EntityRegistry,
}

impl<'a> Tree<'a> {
    /// Create an accessor.
    #[must_use]
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self { registry }
    }

    /// Parent of `entity`; `None` for roots and unresolved parents.
    #[must_use]
    pub fn parent(&self, entity: &Entity) -> Option<EntityRef> {
        entity.parent_id().and_then(|id| self.registry.get(id))
    }

    /// Direct children ordered by `OrderIndex`, then `Title`.
    #[must_use]
    pub fn children(&self, entity: &Entity) -> Vec<EntityRef> {
        self.children_sorted_by(entity, &SortBy::tree_default())
    }

    /// Direct children ordered by `sort`.
    ///
    /// Uses `children_ids` when the server supplied it (unresolved IDs are
    /// dropped), otherwise scans the registry on `ParentID`.
    #[must_use]
    pub fn children_sorted_by(&self, entity: &Entity, sort: &SortBy) -> Vec<EntityRef> {
        let mut children: Vec<EntityRef> = match &entity.children_ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| **id != entity.id && seen.insert(id.as_str()))
                    .filter_map(|id| self.registry.get(id))
                    .collect()
            }
            None => self
                .registry
                .find(|candidate| candidate.id != entity.id && candidate.parent_id() == Some(entity.id.as_str())),
        };
        children.sort_by(|a, b| sort.compare(&a.read(), &b.read()));
        children
    }

    /// Ancestors of `entity`, nearest first.
    #[must_use]
    pub fn ancestors(&self, entity: &Entity) -> Vec<EntityRef> {
        let mut visited = HashSet::from([entity.id.clone()]);
        let mut ancestors = Vec::new();
        let mut next = entity.parent_id().map(str::to_string);

        while let Some(parent_id) = next {
            if !visited.insert(parent_id.clone()) {
                tracing::warn!(kind = %entity.kind, id = %entity.id, parent_id = %parent_id, "parent cycle detected");
                break;
            }
            if ancestors.len() >= TREE_DEPTH_COUNT_MAX {
                tracing::warn!(kind = %entity.kind, id = %entity.id, "tree depth limit reached");
                break;
            }
            let Some(parent) = self.registry.get(&parent_id) else {
                break;
            };
            next = parent.read().parent_id().map(str::to_string);
            ancestors.push(parent);
        }

        ancestors
    }

    /// Titles from the root down to `entity`, joined with `" > "`.
    #[must_use]
    pub fn full_title(&self, entity: &Entity) -> String {
        let mut titles: Vec<String> = self
            .ancestors(entity)
            .iter()
            .map(|ancestor| ancestor.read().title.clone())
            .collect();
        titles.reverse();
        titles.push(entity.title.clone());
        titles.join(TREE_FULL_TITLE_SEPARATOR)
    }

    /// Entities without a parent, in tree order.
    #[must_use]
    pub fn roots(&self) -> Vec<EntityRef> {
        let sort = SortBy::tree_default();
        let mut roots = self.registry.find(Entity::is_root);
        roots.sort_by(|a, b| sort.compare(&a.read(), &b.read()));
        roots
    }

    /// IDs of every descendant of `entity`, breadth first.
    #[must_use]
    pub fn descendant_ids(&self, entity: &Entity) -> Vec<String> {
        let mut visited = HashSet::from([entity.id.clone()]);
        let mut descendants = Vec::new();
        let mut queue: VecDeque<EntityRef> = self.children(entity).into();

        while let Some(child) = queue.pop_front() {
            let child = child.read().clone();
            if !visited.insert(child.id.clone()) {
                tracing::warn!(kind = %entity.kind, id = %child.id, "child cycle detected");
                continue;
            }
            descendants.push(child.id.clone());
            queue.extend(self.children(&child));
        }

        descendants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use serde_json::json;

    fn ids(handles: &[EntityRef]) -> Vec<String> {
        handles.iter().map(|h| h.read().id.clone()).collect()
    }

    fn snapshot(handle: &EntityRef) -> Entity {
        handle.read().clone()
    }

    fn registry_with_children() -> EntityRegistry {
        let registry = EntityRegistry::new(EntityKind::Category);
        registry
            .update(json!({"ID": "x1", "Title": "Cat A", "ParentID": ""}))
            .unwrap();
        registry
            .update(json!({"ID": "c1", "ParentID": "x1", "OrderIndex": 1, "Title": "B"}))
            .unwrap();
        registry
            .update(json!({"ID": "c2", "ParentID": "x1", "OrderIndex": 0, "Title": "A"}))
            .unwrap();
        registry
    }

    #[test]
    fn test_root_has_no_parent() {
        let registry = registry_with_children();
        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap();

        assert_eq!(x1.read().ansi_title, "cat a");
        assert!(tree.parent(&snapshot(&x1)).is_none());
    }

    #[test]
    fn test_children_ordered_by_order_index() {
        let registry = registry_with_children();
        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap();

        assert_eq!(ids(&tree.children(&snapshot(&x1))), vec!["c2", "c1"]);
    }

    #[test]
    fn test_children_ids_and_scan_are_equivalent() {
        let registry = registry_with_children();
        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap();

        let scanned = ids(&tree.children(&snapshot(&x1)));

        x1.write().children_ids = Some(vec!["c1".to_string(), "c2".to_string(), "gone".to_string()]);
        let listed = ids(&tree.children(&snapshot(&x1)));

        assert_eq!(scanned, listed);
    }

    #[test]
    fn test_full_title_and_ancestors() {
        let registry = registry_with_children();
        registry
            .update(json!({"ID": "g1", "ParentID": "c1", "Title": "Leaf"}))
            .unwrap();
        let tree = Tree::new(&registry);
        let g1 = registry.get("g1").unwrap();

        assert_eq!(tree.full_title(&snapshot(&g1)), "Cat A > B > Leaf");
        assert_eq!(ids(&tree.ancestors(&snapshot(&g1))), vec!["c1", "x1"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let registry = EntityRegistry::new(EntityKind::Category);
        registry.update(json!({"ID": "a", "ParentID": "b", "Title": "A"})).unwrap();
        registry.update(json!({"ID": "b", "ParentID": "a", "Title": "B"})).unwrap();
        let tree = Tree::new(&registry);
        let a = registry.get("a").unwrap();

        assert_eq!(tree.full_title(&snapshot(&a)), "B > A");
        assert_eq!(tree.descendant_ids(&snapshot(&a)), vec!["b"]);
    }

    #[test]
    fn test_roots_and_descendants() {
        let registry = registry_with_children();
        registry
            .update(json!({"ID": "g1", "ParentID": "c2", "Title": "Leaf"}))
            .unwrap();
        registry.update(json!({"ID": "x0", "Title": "Another", "OrderIndex": -1})).unwrap();
        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap();

        assert_eq!(ids(&tree.roots()), vec!["x1", "x0"]);
        assert_eq!(tree.descendant_ids(&snapshot(&x1)), vec!["c2", "c1", "g1"]);
    }

    #[test]
    fn test_children_sorted_by_custom_sort() {
        let registry = registry_with_children();
        let tree = Tree::new(&registry);
        let x1 = registry.get("x1").unwrap();

        let sorted = tree.children_sorted_by(&x1.read(), &SortBy::new().descending("Title"));
        assert_eq!(ids(&sorted), vec!["c1", "c2"]);
    }
}
