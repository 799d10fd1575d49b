//! Capability layer
//!
//! The handle table maps opaque IDs to typed kernel-object references
//! with rights. Rights only ever attenuate: `duplicate` intersects,
//! `get` checks containment, and nothing escalates an existing entry.

pub mod object;
pub mod table;

pub use object::{KernelObject, ObjectKind};
pub use table::{HandleTable, DEFAULT_BUCKETS};
