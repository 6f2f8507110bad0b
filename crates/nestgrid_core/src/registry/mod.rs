//! Hierarchical domain registry.
//!
//! # Responsibility
//! - Own the root domain and every child domain of one configuration.
//! - Keep ids unique across the whole tree and parent/child links
//!   consistent through attach and detach.
//!
//! # Invariants
//! - Structural and argument errors fail fast; nothing is mutated on error.
//! - Detaching a node that is not a child is reported as an outcome, never
//!   as an error.

use crate::model::domain::{DomainId, DomainKey, GridValidationError};
use crate::model::field::FieldValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod domain_registry;
pub mod node;

pub use domain_registry::{DomainRegistry, IdReleasePolicy};
pub use node::{AttachState, DomainNode, DomainVariant, NodeKind};

/// Result type used by registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Domain id is negative or out of range.
    InvalidDomainId(i64),
    /// Grid metadata or child offset is malformed.
    InvalidGrid(GridValidationError),
    /// Field record failed validation.
    InvalidField(FieldValidationError),
    /// Id is already registered somewhere in the target tree.
    DuplicateId(DomainId),
    /// Node variant does not fit the operation.
    TypeMismatch {
        key: DomainKey,
        expected: NodeKind,
        found: NodeKind,
    },
    /// Child already has a parent.
    AlreadyAttached { child: DomainId, parent: DomainId },
    /// Parent is the child itself or one of its descendants.
    CycleDetected { child: DomainId, parent: DomainId },
    /// Handle does not belong to this registry.
    NodeNotFound(DomainKey),
    /// Field name already used on this domain.
    DuplicateField { domain: DomainId, name: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDomainId(value) => {
                write!(f, "domain id must be a non-negative 32-bit integer, got {value}")
            }
            Self::InvalidGrid(err) => write!(f, "invalid grid configuration: {err}"),
            Self::InvalidField(err) => write!(f, "invalid field: {err}"),
            Self::DuplicateId(id) => write!(f, "domain id {id} already in use"),
            Self::TypeMismatch {
                key,
                expected,
                found,
            } => write!(
                f,
                "expected {} domain, got {} domain: {key}",
                expected.as_str(),
                found.as_str()
            ),
            Self::AlreadyAttached { child, parent } => {
                write!(f, "domain {child} is already a child of domain {parent}")
            }
            Self::CycleDetected { child, parent } => write!(
                f,
                "attaching domain {child} under domain {parent} would create a cycle"
            ),
            Self::NodeNotFound(key) => write!(f, "domain node not found: {key}"),
            Self::DuplicateField { domain, name } => {
                write!(f, "field `{name}` already defined on domain {domain}")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidGrid(err) => Some(err),
            Self::InvalidField(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GridValidationError> for RegistryError {
    fn from(value: GridValidationError) -> Self {
        Self::InvalidGrid(value)
    }
}

impl From<FieldValidationError> for RegistryError {
    fn from(value: FieldValidationError) -> Self {
        Self::InvalidField(value)
    }
}

/// Result of a detach call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    /// Link removed. `released` tells whether the subtree's ids were
    /// returned to the tree for reuse.
    Detached { released: bool },
    /// Node was not a child of the given parent; nothing changed.
    NotAChild { parent: DomainId, child: DomainId },
}

impl DetachOutcome {
    pub fn is_detached(self) -> bool {
        matches!(self, Self::Detached { .. })
    }

    /// Caller-facing warning text for the recoverable case.
    pub fn warning(self) -> Option<String> {
        match self {
            Self::Detached { .. } => None,
            Self::NotAChild { parent, child } => Some(format!(
                "domain {child} is not a child of domain {parent}"
            )),
        }
    }
}
