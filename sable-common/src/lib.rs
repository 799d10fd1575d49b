//! # sable-common
//!
//! Shared types and constants for the Sable kernel-object nucleus.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//! - [`PhysAddr`] / [`VirtAddr`]: address newtypes used across subsystem
//!   boundaries
//! - [`page`]: the page geometry (4 KiB pages) and alignment helpers
//!
//! # no_std
//!
//! This crate is `#![no_std]` and has zero dependencies, making it suitable
//! as a foundation crate that every other Sable crate can depend on.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod addr;
pub mod page;

pub use addr::{PhysAddr, VirtAddr};
