//! Arena-backed domain tree with tree-wide id registration.
//!
//! # Responsibility
//! - Create the root and detached child nodes.
//! - Attach/detach children while registering ids at the top-most ancestor.
//! - Answer structural queries (ancestry, depth, id lookup, placement).
//!
//! # Invariants
//! - Ids reachable from the root are pairwise distinct, root id included.
//! - `known_ids` of a top-most node covers its whole subtree.
//! - No node is its own ancestor.
//! - Every mutation validates fully before touching state.

use super::node::{AttachState, DomainNode, DomainVariant, NodeKind};
use super::{DetachOutcome, RegistryError, RegistryResult};
use crate::model::domain::{DomainId, DomainKey, GridConfig, GridValidationError, Point};
use crate::model::field::{Field, FieldKind};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// What happens to a subtree's ids when it is detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdReleasePolicy {
    /// Ids stay registered at the root and cannot be reused.
    #[default]
    Reserve,
    /// Ids are removed from the root and travel with the detached subtree.
    Release,
}

/// Owner of one domain tree and its detached nodes.
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    root: DomainKey,
    nodes: BTreeMap<DomainKey, DomainNode>,
    id_release: IdReleasePolicy,
}

impl DomainRegistry {
    /// Creates a registry holding a single root domain.
    ///
    /// The root registers its own id, so no child can reuse it.
    ///
    /// # Errors
    /// - `InvalidDomainId` for negative ids.
    /// - `InvalidGrid` when `grid` fails validation.
    pub fn create_root(id: i64, grid: GridConfig) -> RegistryResult<Self> {
        let id = parse_domain_id(id)?;
        grid.validate()?;

        let key = Uuid::new_v4();
        let mut nodes = BTreeMap::new();
        nodes.insert(key, DomainNode::new(key, id, DomainVariant::Root, grid));
        debug!("event=domain_create module=registry status=ok kind=root domain_id={id}");

        Ok(Self {
            root: key,
            nodes,
            id_release: IdReleasePolicy::default(),
        })
    }

    /// Sets the id release policy applied by later detach calls.
    pub fn with_id_release(mut self, policy: IdReleasePolicy) -> Self {
        self.id_release = policy;
        self
    }

    pub fn id_release(&self) -> IdReleasePolicy {
        self.id_release
    }

    /// Creates a detached child node.
    ///
    /// No id is registered until the node is attached.
    ///
    /// # Errors
    /// - `InvalidDomainId` for negative ids.
    /// - `InvalidGrid` for a non-finite offset or invalid `grid`.
    pub fn create_child(
        &mut self,
        id: i64,
        offset: Option<Point>,
        grid: GridConfig,
    ) -> RegistryResult<DomainKey> {
        let id = parse_domain_id(id)?;
        if offset.is_some_and(|offset| !offset.is_finite()) {
            return Err(GridValidationError::NonFiniteCoordinate { field: "offset" }.into());
        }
        grid.validate()?;

        let key = Uuid::new_v4();
        self.nodes.insert(
            key,
            DomainNode::new(
                key,
                id,
                DomainVariant::Child {
                    parent: None,
                    offset,
                },
                grid,
            ),
        );
        debug!("event=domain_create module=registry status=ok kind=child domain_id={id}");
        Ok(key)
    }

    /// Attaches a detached child under `parent`.
    ///
    /// The child's id, plus the ids of any subtree it already carries, are
    /// registered at the top-most ancestor of `parent`.
    ///
    /// # Errors
    /// - `TypeMismatch` when `child` is the root.
    /// - `AlreadyAttached` when `child` already has a parent.
    /// - `CycleDetected` when `parent` is `child` or one of its descendants.
    /// - `DuplicateId` when any incoming id is already registered.
    pub fn attach(&mut self, parent: DomainKey, child: DomainKey) -> RegistryResult<()> {
        let child_node = self.require(child)?;
        let child_id = child_node.id;
        match child_node.variant {
            DomainVariant::Root => {
                return Err(RegistryError::TypeMismatch {
                    key: child,
                    expected: NodeKind::Child,
                    found: NodeKind::Root,
                });
            }
            DomainVariant::Child {
                parent: Some(current),
                ..
            } => {
                return Err(RegistryError::AlreadyAttached {
                    child: child_id,
                    parent: self.require(current)?.id,
                });
            }
            DomainVariant::Child { parent: None, .. } => {}
        }

        let parent_id = self.require(parent)?.id;
        if parent == child || self.is_ancestor(child, parent)? {
            warn!(
                "event=domain_attach module=registry status=rejected error_code=cycle parent_id={parent_id} child_id={child_id}"
            );
            return Err(RegistryError::CycleDetected {
                child: child_id,
                parent: parent_id,
            });
        }

        let top = self.root_of(parent)?;
        let incoming = self.require(child)?.known_ids.clone();
        self.register_ids(top, &incoming)?;

        let child_node = self.require_mut(child)?;
        child_node.known_ids.clear();
        child_node.set_parent(Some(parent));
        self.require_mut(parent)?.children.push(child);

        debug!(
            "event=domain_attach module=registry status=ok parent_id={parent_id} child_id={child_id} registered={}",
            incoming.len()
        );
        Ok(())
    }

    /// Detaches `child` from `parent`.
    ///
    /// A `child` that is not listed under `parent` leaves the tree untouched
    /// and yields `DetachOutcome::NotAChild`.
    ///
    /// # Errors
    /// - `TypeMismatch` when `child` is the root.
    /// - `NodeNotFound` for unknown handles.
    pub fn detach(
        &mut self,
        parent: DomainKey,
        child: DomainKey,
    ) -> RegistryResult<DetachOutcome> {
        let parent_id = self.require(parent)?.id;
        let child_node = self.require(child)?;
        if child_node.is_root() {
            return Err(RegistryError::TypeMismatch {
                key: child,
                expected: NodeKind::Child,
                found: NodeKind::Root,
            });
        }
        let child_id = child_node.id;

        let parent_node = self.require_mut(parent)?;
        let Some(position) = parent_node.children.iter().position(|key| *key == child) else {
            warn!(
                "event=domain_detach module=registry status=skipped error_code=not_a_child parent_id={parent_id} child_id={child_id}"
            );
            return Ok(DetachOutcome::NotAChild {
                parent: parent_id,
                child: child_id,
            });
        };
        parent_node.children.remove(position);

        let subtree = self.subtree_ids(child)?;
        let top = self.root_of(parent)?;
        let released = self.id_release == IdReleasePolicy::Release;
        if released {
            self.require_mut(top)?
                .known_ids
                .retain(|id| !subtree.contains(id));
        }

        let child_node = self.require_mut(child)?;
        child_node.set_parent(None);
        child_node.known_ids = subtree;

        debug!(
            "event=domain_detach module=registry status=ok parent_id={parent_id} child_id={child_id} released={released}"
        );
        Ok(DetachOutcome::Detached { released })
    }

    /// Appends a static field to one domain.
    ///
    /// # Errors
    /// - `InvalidField` when the record fails validation.
    /// - `DuplicateField` when the name is taken on this domain.
    pub fn add_static_field(&mut self, key: DomainKey, field: Field) -> RegistryResult<()> {
        self.add_field(key, FieldKind::Static, field)
    }

    /// Appends a dynamic field to one domain.
    ///
    /// Same rules as `add_static_field`; names are unique across both sets.
    pub fn add_dynamic_field(&mut self, key: DomainKey, field: Field) -> RegistryResult<()> {
        self.add_field(key, FieldKind::Dynamic, field)
    }

    pub fn root(&self) -> DomainKey {
        self.root
    }

    pub fn root_node(&self) -> &DomainNode {
        // The root entry is inserted at construction and never removed.
        &self.nodes[&self.root]
    }

    pub fn node(&self, key: DomainKey) -> Option<&DomainNode> {
        self.nodes.get(&key)
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, key: DomainKey) -> Option<DomainKey> {
        self.nodes.get(&key).and_then(DomainNode::parent)
    }

    pub fn children(&self, key: DomainKey) -> Option<&[DomainKey]> {
        self.nodes.get(&key).map(DomainNode::children)
    }

    /// Returns `false` for unknown handles.
    pub fn has_children(&self, key: DomainKey) -> bool {
        self.nodes.get(&key).is_some_and(DomainNode::has_children)
    }

    pub fn state(&self, key: DomainKey) -> Option<AttachState> {
        self.nodes.get(&key).map(DomainNode::state)
    }

    /// Walks parent links up to the top-most ancestor of `key`.
    ///
    /// That is the root for attached nodes, or the top of a detached subtree.
    pub fn root_of(&self, key: DomainKey) -> RegistryResult<DomainKey> {
        let mut cursor = key;
        while let Some(parent) = self.require(cursor)?.parent() {
            cursor = parent;
        }
        Ok(cursor)
    }

    /// Number of parent links between `key` and its top-most ancestor.
    pub fn depth(&self, key: DomainKey) -> RegistryResult<usize> {
        let mut depth = 0;
        let mut cursor = self.require(key)?.parent();
        while let Some(current) = cursor {
            depth += 1;
            cursor = self.require(current)?.parent();
        }
        Ok(depth)
    }

    /// Looks up a node reachable from the root by its domain id.
    ///
    /// Detached nodes are not part of the flat id space and are skipped.
    pub fn find_by_id(&self, id: DomainId) -> Option<DomainKey> {
        self.walk(self.root)
            .ok()?
            .into_iter()
            .map(|(_, key)| key)
            .find(|key| self.nodes.get(key).is_some_and(|node| node.id == id))
    }

    /// Pre-order walk of the subtree under `key`, `key` itself first.
    ///
    /// Each entry carries its depth relative to `key`.
    pub fn walk(&self, key: DomainKey) -> RegistryResult<Vec<(usize, DomainKey)>> {
        let mut visited = Vec::new();
        let mut stack = vec![(0, key)];
        while let Some((depth, current)) = stack.pop() {
            let node = self.require(current)?;
            visited.push((depth, current));
            stack.extend(node.children.iter().rev().map(|child| (depth + 1, *child)));
        }
        Ok(visited)
    }

    /// Pre-order descendants of `key`, excluding `key`.
    pub fn descendants(&self, key: DomainKey) -> RegistryResult<Vec<DomainKey>> {
        Ok(self
            .walk(key)?
            .into_iter()
            .skip(1)
            .map(|(_, descendant)| descendant)
            .collect())
    }

    /// Absolute origin of a node: root origin plus the chain of offsets.
    ///
    /// `None` when the node is detached, any link lacks an origin/offset, or
    /// the sum leaves the finite range.
    pub fn absolute_origin(&self, key: DomainKey) -> Option<Point> {
        let mut accumulated = Point::new(0.0, 0.0);
        let mut cursor = self.nodes.get(&key)?;
        loop {
            match cursor.variant {
                DomainVariant::Root => {
                    let origin = cursor.grid.origin? + accumulated;
                    return origin.is_finite().then_some(origin);
                }
                DomainVariant::Child { parent, offset } => {
                    accumulated = accumulated + offset?;
                    cursor = self.nodes.get(&parent?)?;
                }
            }
        }
    }

    fn add_field(
        &mut self,
        key: DomainKey,
        kind: FieldKind,
        field: Field,
    ) -> RegistryResult<()> {
        field.validate()?;
        let node = self.require_mut(key)?;
        if node.field(&field.name).is_some() {
            return Err(RegistryError::DuplicateField {
                domain: node.id,
                name: field.name,
            });
        }

        debug!(
            "event=field_add module=registry status=ok domain_id={} kind={} name={}",
            node.id,
            kind.as_str(),
            field.name
        );
        match kind {
            FieldKind::Static => node.static_fields.push(field),
            FieldKind::Dynamic => node.dynamic_fields.push(field),
        }
        Ok(())
    }

    fn register_ids(
        &mut self,
        top: DomainKey,
        incoming: &BTreeSet<DomainId>,
    ) -> RegistryResult<()> {
        let top_node = self.require_mut(top)?;
        if let Some(taken) = incoming.iter().find(|id| top_node.known_ids.contains(*id)) {
            warn!(
                "event=domain_attach module=registry status=rejected error_code=duplicate_id domain_id={taken}"
            );
            return Err(RegistryError::DuplicateId(*taken));
        }
        top_node.known_ids.extend(incoming.iter().copied());
        Ok(())
    }

    fn subtree_ids(&self, key: DomainKey) -> RegistryResult<BTreeSet<DomainId>> {
        self.walk(key)?
            .into_iter()
            .map(|(_, current)| self.require(current).map(|node| node.id))
            .collect()
    }

    fn is_ancestor(&self, ancestor: DomainKey, key: DomainKey) -> RegistryResult<bool> {
        let mut cursor = self.require(key)?.parent();
        while let Some(current) = cursor {
            if current == ancestor {
                return Ok(true);
            }
            cursor = self.require(current)?.parent();
        }
        Ok(false)
    }

    fn require(&self, key: DomainKey) -> RegistryResult<&DomainNode> {
        self.nodes.get(&key).ok_or(RegistryError::NodeNotFound(key))
    }

    fn require_mut(&mut self, key: DomainKey) -> RegistryResult<&mut DomainNode> {
        self.nodes
            .get_mut(&key)
            .ok_or(RegistryError::NodeNotFound(key))
    }
}

fn parse_domain_id(value: i64) -> RegistryResult<DomainId> {
    DomainId::new(value).ok_or(RegistryError::InvalidDomainId(value))
}

#[cfg(test)]
mod tests {
    use super::{DomainRegistry, IdReleasePolicy};
    use crate::model::domain::{DomainId, GridConfig, Point};
    use crate::registry::{AttachState, DetachOutcome, RegistryError};
    use uuid::Uuid;

    fn root_registry() -> DomainRegistry {
        DomainRegistry::create_root(0, GridConfig::default()).expect("root should be created")
    }

    #[test]
    fn root_registers_its_own_id() {
        let mut registry = root_registry();
        assert!(registry.root_node().known_ids().contains(&DomainId::from(0)));

        let clash = registry
            .create_child(0, None, GridConfig::default())
            .expect("child should be created");
        let err = registry
            .attach(registry.root(), clash)
            .expect_err("root id must not be reusable");
        assert_eq!(err, RegistryError::DuplicateId(DomainId::from(0)));
    }

    #[test]
    fn rejects_negative_ids() {
        assert_eq!(
            DomainRegistry::create_root(-1, GridConfig::default()).unwrap_err(),
            RegistryError::InvalidDomainId(-1)
        );
        let mut registry = root_registry();
        assert_eq!(
            registry
                .create_child(-7, None, GridConfig::default())
                .unwrap_err(),
            RegistryError::InvalidDomainId(-7)
        );
    }

    #[test]
    fn rejects_non_finite_offset() {
        let mut registry = root_registry();
        let err = registry
            .create_child(1, Some(Point::new(f64::NAN, 0.0)), GridConfig::default())
            .expect_err("nan offset must fail");
        assert!(matches!(err, RegistryError::InvalidGrid(_)));
    }

    #[test]
    fn failed_attach_leaves_state_untouched() {
        let mut registry = root_registry();
        let first = registry
            .create_child(1, None, GridConfig::default())
            .expect("child");
        registry.attach(registry.root(), first).expect("attach");

        let second = registry
            .create_child(1, None, GridConfig::default())
            .expect("child");
        registry
            .attach(registry.root(), second)
            .expect_err("duplicate must fail");

        assert_eq!(registry.children(registry.root()), Some(&[first][..]));
        assert_eq!(registry.state(second), Some(AttachState::Detached));
        assert_eq!(registry.parent(second), None);
    }

    #[test]
    fn detached_subtree_keeps_its_ids_until_attached() {
        let mut registry = root_registry();
        let branch = registry
            .create_child(10, None, GridConfig::default())
            .expect("branch");
        let leaf = registry
            .create_child(11, None, GridConfig::default())
            .expect("leaf");
        registry.attach(branch, leaf).expect("leaf under detached branch");

        let branch_ids = registry.node(branch).expect("branch node").known_ids();
        assert!(branch_ids.contains(&DomainId::from(10)));
        assert!(branch_ids.contains(&DomainId::from(11)));
        assert!(!registry
            .root_node()
            .known_ids()
            .contains(&DomainId::from(11)));

        registry.attach(registry.root(), branch).expect("attach branch");
        assert!(registry
            .root_node()
            .known_ids()
            .contains(&DomainId::from(11)));
        assert!(registry.node(branch).expect("branch").known_ids().is_empty());
        assert_eq!(registry.find_by_id(DomainId::from(11)), Some(leaf));
    }

    #[test]
    fn release_policy_moves_ids_with_detached_subtree() {
        let mut registry = root_registry().with_id_release(IdReleasePolicy::Release);
        let child = registry
            .create_child(1, None, GridConfig::default())
            .expect("child");
        registry.attach(registry.root(), child).expect("attach");

        let outcome = registry.detach(registry.root(), child).expect("detach");
        assert_eq!(outcome, DetachOutcome::Detached { released: true });
        assert!(!registry
            .root_node()
            .known_ids()
            .contains(&DomainId::from(1)));
        assert!(registry
            .node(child)
            .expect("child")
            .known_ids()
            .contains(&DomainId::from(1)));

        registry
            .attach(registry.root(), child)
            .expect("released subtree can be attached again");
    }

    #[test]
    fn unknown_handles_are_reported() {
        let mut registry = root_registry();
        let stranger = Uuid::new_v4();
        assert_eq!(
            registry.attach(registry.root(), stranger).unwrap_err(),
            RegistryError::NodeNotFound(stranger)
        );
        assert!(registry.node(stranger).is_none());
        assert!(!registry.has_children(stranger));
    }

    #[test]
    fn absolute_origin_accumulates_offsets() {
        let mut registry = DomainRegistry::create_root(
            0,
            GridConfig {
                origin: Some(Point::new(1000.0, 2000.0)),
                ..GridConfig::default()
            },
        )
        .expect("root");
        let child = registry
            .create_child(1, Some(Point::new(100.0, 50.0)), GridConfig::default())
            .expect("child");
        let grandchild = registry
            .create_child(2, Some(Point::new(10.0, 5.0)), GridConfig::default())
            .expect("grandchild");
        let unplaced = registry
            .create_child(3, None, GridConfig::default())
            .expect("unplaced");
        registry.attach(registry.root(), child).expect("attach");
        registry.attach(child, grandchild).expect("attach");
        registry.attach(child, unplaced).expect("attach");

        assert_eq!(
            registry.absolute_origin(grandchild),
            Some(Point::new(1110.0, 2055.0))
        );
        assert_eq!(registry.absolute_origin(unplaced), None);
        assert!(registry.node(child).expect("child").origin_set());
        assert!(!registry.node(unplaced).expect("unplaced").origin_set());
    }

    #[test]
    fn absolute_origin_is_none_when_sum_overflows() {
        let mut registry = DomainRegistry::create_root(
            0,
            GridConfig {
                origin: Some(Point::new(f64::MAX, 0.0)),
                ..GridConfig::default()
            },
        )
        .expect("root");
        let child = registry
            .create_child(1, Some(Point::new(f64::MAX, 0.0)), GridConfig::default())
            .expect("finite offset is valid");
        registry.attach(registry.root(), child).expect("attach");

        assert_eq!(registry.absolute_origin(child), None);
        assert_eq!(
            registry.absolute_origin(registry.root()),
            Some(Point::new(f64::MAX, 0.0))
        );
    }

    #[test]
    fn walk_is_pre_order_with_depths() {
        let mut registry = root_registry();
        let a = registry.create_child(1, None, GridConfig::default()).expect("a");
        let b = registry.create_child(2, None, GridConfig::default()).expect("b");
        let a1 = registry.create_child(3, None, GridConfig::default()).expect("a1");
        registry.attach(registry.root(), a).expect("attach a");
        registry.attach(registry.root(), b).expect("attach b");
        registry.attach(a, a1).expect("attach a1");

        let walk = registry.walk(registry.root()).expect("walk");
        assert_eq!(walk, vec![(0, registry.root()), (1, a), (2, a1), (1, b)]);
        assert_eq!(registry.depth(a1).expect("depth"), 2);
        assert_eq!(registry.root_of(a1).expect("root_of"), registry.root());
    }
}
