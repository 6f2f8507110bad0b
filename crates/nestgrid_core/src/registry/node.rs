//! Domain node storage record.

use crate::model::domain::{DomainId, DomainKey, GridConfig, Point};
use crate::model::field::{Field, FieldKind};
use std::collections::BTreeSet;

/// Variant tag of one domain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Child,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Child => "child",
        }
    }
}

/// Structural state of a child node.
///
/// The root is always reported as `Attached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// No parent; ids live in this node's own `known_ids`.
    Detached,
    /// Has a parent, ids registered at the top-most ancestor.
    Attached,
}

/// Variant-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainVariant {
    Root,
    Child {
        parent: Option<DomainKey>,
        /// Origin offset with respect to the parent's origin.
        offset: Option<Point>,
    },
}

/// One node of the domain tree as stored in the registry arena.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainNode {
    pub(crate) key: DomainKey,
    pub(crate) id: DomainId,
    pub(crate) variant: DomainVariant,
    pub(crate) grid: GridConfig,
    pub(crate) children: Vec<DomainKey>,
    pub(crate) known_ids: BTreeSet<DomainId>,
    pub(crate) static_fields: Vec<Field>,
    pub(crate) dynamic_fields: Vec<Field>,
}

impl DomainNode {
    pub(crate) fn new(
        key: DomainKey,
        id: DomainId,
        variant: DomainVariant,
        grid: GridConfig,
    ) -> Self {
        Self {
            key,
            id,
            variant,
            grid,
            children: Vec::new(),
            known_ids: BTreeSet::from([id]),
            static_fields: Vec::new(),
            dynamic_fields: Vec::new(),
        }
    }

    pub fn key(&self) -> DomainKey {
        self.key
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        match self.variant {
            DomainVariant::Root => NodeKind::Root,
            DomainVariant::Child { .. } => NodeKind::Child,
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind() == NodeKind::Root
    }

    pub fn variant(&self) -> &DomainVariant {
        &self.variant
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Parent handle; always `None` for the root.
    pub fn parent(&self) -> Option<DomainKey> {
        match self.variant {
            DomainVariant::Root => None,
            DomainVariant::Child { parent, .. } => parent,
        }
    }

    pub fn offset(&self) -> Option<Point> {
        match self.variant {
            DomainVariant::Root => None,
            DomainVariant::Child { offset, .. } => offset,
        }
    }

    pub fn state(&self) -> AttachState {
        match self.variant {
            DomainVariant::Root => AttachState::Attached,
            DomainVariant::Child { parent: None, .. } => AttachState::Detached,
            DomainVariant::Child {
                parent: Some(_), ..
            } => AttachState::Attached,
        }
    }

    /// Whether this node can be placed in absolute coordinates relative to
    /// its parent: an origin for the root, an offset for a child.
    pub fn origin_set(&self) -> bool {
        match self.variant {
            DomainVariant::Root => self.grid.origin.is_some(),
            DomainVariant::Child { offset, .. } => offset.is_some(),
        }
    }

    /// Ordered child handles.
    pub fn children(&self) -> &[DomainKey] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Ids registered at this node.
    ///
    /// For the root: every id in use in the tree, its own included. For a
    /// detached child: the ids of its own detached subtree. Empty for an
    /// attached child.
    pub fn known_ids(&self) -> &BTreeSet<DomainId> {
        &self.known_ids
    }

    pub fn static_fields(&self) -> &[Field] {
        &self.static_fields
    }

    pub fn dynamic_fields(&self) -> &[Field] {
        &self.dynamic_fields
    }

    /// Looks up a field by name across both sets.
    pub fn field(&self, name: &str) -> Option<(FieldKind, &Field)> {
        self.static_fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| (FieldKind::Static, field))
            .or_else(|| {
                self.dynamic_fields
                    .iter()
                    .find(|field| field.name == name)
                    .map(|field| (FieldKind::Dynamic, field))
            })
    }

    pub(crate) fn set_parent(&mut self, new_parent: Option<DomainKey>) {
        if let DomainVariant::Child { parent, .. } = &mut self.variant {
            *parent = new_parent;
        }
    }
}
