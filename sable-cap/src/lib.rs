//! # sable-cap
//!
//! Capability vocabulary for the Sable kernel-object nucleus.
//!
//! A **handle** is an unforgeable token naming a kernel object through a
//! table entry that pairs an object reference with access rights. Handles
//! are the only way user code reaches kernel resources: they cannot be
//! forged or guessed, only granted, duplicated (with attenuated rights),
//! transferred over channels, and closed.
//!
//! # Core types
//!
//! - [`Handle`]: opaque non-zero ID naming a handle-table entry
//! - [`Rights`]: access permissions (read, write, duplicate, transfer)
//! - [`Status`]: the nucleus-wide error enumeration
//!
//! The handle *table* itself lives in `sable-kernel`; this crate only
//! defines the vocabulary so that user-facing crates can speak it without
//! pulling in the nucleus.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

mod error;
mod handle;
mod rights;

pub use error::{KernelResult, Status};
pub use handle::Handle;
pub use rights::Rights;
