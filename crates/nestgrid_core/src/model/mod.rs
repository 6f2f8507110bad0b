//! Domain and field data model.
//!
//! # Responsibility
//! - Define the value types the registry stores per node.
//! - Keep grid and field validation independent of tree bookkeeping.
//!
//! # Invariants
//! - Model types never reference other nodes; structure lives in the
//!   registry.

pub mod domain;
pub mod field;
