//! # sable-kernel
//!
//! The kernel-object nucleus of the Sable microkernel: the subsystems
//! every higher layer builds on, implementable and testable in isolation
//! from the board bring-up.
//!
//! # Subsystems
//!
//! - [`memory`]: the physical-memory arena ([`PmmArena`]), lazily
//!   committed memory objects ([`VmObject`]) and the page-fault resolver
//!   ([`PageFaultHandler`]) that ties them together
//! - [`cap`]: the handle table mapping opaque IDs to typed kernel objects
//!   with monotonically attenuating rights
//! - [`ipc`]: channels — paired, bidirectional message queues addressed
//!   by endpoint handles
//! - [`context`]: the injectable [`KernelContext`] bundling one arena
//!   with one handle table
//!
//! # Locking
//!
//! Every stateful object carries its own monitor lock. Acquisition order
//! is fixed: handle table before channel pair, VMO before arena; no
//! reverse acquisition exists. No core operation blocks on an external
//! event — an empty-queue read reports
//! [`ShouldWait`](sable_cap::Status::ShouldWait) instead of waiting.
//!
//! # Errors
//!
//! Every fallible operation returns [`KernelResult`]. No operation
//! performs partial mutation on failure; internal invariant violations
//! (a corrupt free list, a vanished queue head) panic rather than being
//! silently ignored.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod cap;
pub mod config;
pub mod context;
pub mod ipc;
pub mod memory;

pub use cap::{HandleTable, KernelObject, ObjectKind};
pub use config::KernelConfig;
pub use context::KernelContext;
pub use ipc::channel;
pub use memory::{FaultFlags, PageFaultHandler, PmmArena, VmObject};

pub use sable_cap::{Handle, KernelResult, Rights, Status};
