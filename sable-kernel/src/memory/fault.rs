//! Page-fault resolution
//!
//! The fault handler is a stateless broker: it turns a faulting virtual
//! address into a commit on the backing VMO, so the VMO alone owns the
//! commitment bookkeeping. Access-policy decisions (which flag
//! combinations are admissible) live here, not in the VMO.

use alloc::sync::Arc;
use core::fmt;

use sable_cap::{KernelResult, Status};
use sable_common::VirtAddr;

use super::pmm::PmmArena;
use super::vmo::VmObject;

/// Flags describing the faulting access.
///
/// # Layout
///
/// - Bit 0: Read
/// - Bit 1: Write
/// - Bit 2: Exec
/// - Bit 3: User (the access originated in user context)
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct FaultFlags(u32);

impl FaultFlags {
    /// A read access.
    pub const READ: Self = Self(1 << 0);

    /// A write access.
    pub const WRITE: Self = Self(1 << 1);

    /// An instruction fetch.
    pub const EXEC: Self = Self(1 << 2);

    /// The access came from user context.
    pub const USER: Self = Self(1 << 3);

    /// Create flags from raw bits (reserved bits masked off).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0x0F)
    }

    /// Get the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if the Write bit is set.
    #[inline]
    #[must_use]
    pub const fn is_write(self) -> bool {
        (self.0 & Self::WRITE.0) != 0
    }

    /// Check if the User bit is set.
    #[inline]
    #[must_use]
    pub const fn is_user(self) -> bool {
        (self.0 & Self::USER.0) != 0
    }

    /// Check if all flags in `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for FaultFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for FaultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FaultFlags({}{}{}{})",
            if self.contains(Self::READ) { "r" } else { "-" },
            if self.is_write() { "w" } else { "-" },
            if self.contains(Self::EXEC) { "x" } else { "-" },
            if self.is_user() { "u" } else { "-" },
        )
    }
}

/// Resolves faults against one VMO backed by one arena.
///
/// The handler holds strong references to both, so they outlive it by
/// construction.
pub struct PageFaultHandler {
    vmo: Arc<VmObject>,
    arena: Arc<PmmArena>,
}

impl PageFaultHandler {
    /// Bind a handler to a VMO and its backing arena.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` if `vmo` is not bound to `arena`.
    pub fn new(vmo: Arc<VmObject>, arena: Arc<PmmArena>) -> KernelResult<Self> {
        if !Arc::ptr_eq(vmo.arena(), &arena) {
            return Err(Status::InvalidArgs);
        }
        Ok(Self { vmo, arena })
    }

    /// Resolve a fault at `fault_addr`.
    ///
    /// The faulting page index is `fault_addr / PAGE_SIZE`. A successful
    /// commit resolves the fault; faults on already-committed pages
    /// succeed with no arena activity.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` for a write from non-user context: kernel-originated
    ///   writes must not lazily fault user VMOs
    /// - `NotFound` if the address is past the end of the VMO
    /// - `NoMemory` propagated from the arena
    pub fn handle(&self, fault_addr: VirtAddr, flags: FaultFlags) -> KernelResult<()> {
        if flags.is_write() && !flags.is_user() {
            return Err(Status::InvalidArgs);
        }

        let index = fault_addr.page_index() as usize;
        if index >= self.vmo.page_count() {
            return Err(Status::NotFound);
        }

        self.vmo.commit_page(index)?;
        log::trace!(
            "fault: {} {:?} resolved to page {} ({} free)",
            fault_addr,
            flags,
            index,
            self.arena.free_count()
        );
        Ok(())
    }
}
