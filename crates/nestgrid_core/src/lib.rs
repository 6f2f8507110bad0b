//! Core configuration model for nested simulation domains.
//! This crate is the single source of truth for domain tree invariants.

pub mod layout;
pub mod logging;
pub mod model;
pub mod registry;

pub use layout::{DomainLayout, LayoutError, NodeLayout};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::domain::{
    DomainId, DomainKey, GridConfig, GridSpec, GridValidationError, Point, Resolution, Shape,
};
pub use model::field::{Field, FieldKind, FieldValidationError};
pub use registry::{
    AttachState, DetachOutcome, DomainNode, DomainRegistry, DomainVariant, IdReleasePolicy,
    NodeKind, RegistryError, RegistryResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
