//! Nucleus configuration

use sable_cap::{KernelResult, Status};
use sable_common::page::is_page_multiple;
use sable_common::PhysAddr;

/// Configuration for a kernel context.
///
/// Plain data; [`validate`](Self::validate) applies the same geometry
/// rules the arena itself enforces, so a bad configuration is caught
/// before any storage is reserved.
#[derive(Clone, Copy, Debug)]
pub struct KernelConfig {
    /// Base of the physical range handed to the PMM arena.
    pub arena_base: PhysAddr,
    /// Size of the arena range in bytes; must be a positive multiple of
    /// the page size.
    pub arena_size: u64,
    /// Handle-table bucket count; 0 selects the default.
    pub handle_buckets: usize,
}

impl KernelConfig {
    /// Create a configuration with the default handle-table geometry.
    #[must_use]
    pub const fn new(arena_base: PhysAddr, arena_size: u64) -> Self {
        Self {
            arena_base,
            arena_size,
            handle_buckets: 0,
        }
    }

    /// Check the configuration without building anything.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` if the arena base is unaligned or the size is zero
    /// or not a multiple of the page size.
    pub fn validate(&self) -> KernelResult<()> {
        if !self.arena_base.is_page_aligned()
            || self.arena_size == 0
            || !is_page_multiple(self.arena_size)
        {
            return Err(Status::InvalidArgs);
        }
        Ok(())
    }
}
