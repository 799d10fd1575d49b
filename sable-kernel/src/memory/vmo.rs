//! Virtual memory objects
//!
//! A [`VmObject`] is a sized, page-indexed container of optionally
//! committed physical pages. Creating one reserves a slot array and
//! commits nothing; pages are bound on demand (normally by the page-fault
//! resolver) and returned to the arena when the object is destroyed.
//!
//! # Invariants
//!
//! - the set of non-empty slots is exactly the set of committed pages
//! - every committed page was allocated from the arena the VMO is bound to
//! - destroying the VMO restores the arena's free count to its value
//!   before the VMO's first commit (absent other arena activity)
//!
//! Lock order: the VMO's monitor lock may be held while taking the arena
//! lock, never the reverse.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use sable_cap::{KernelResult, Status};
use sable_common::page::pages_for;
use sable_common::PhysAddr;

use super::page::PageRef;
use super::pmm::PmmArena;

/// A lazily-committed virtual memory object.
pub struct VmObject {
    arena: Arc<PmmArena>,
    inner: Mutex<VmoInner>,
}

struct VmoInner {
    size: u64,
    /// One slot per page; `None` until committed.
    pages: Box<[Option<PageRef>]>,
}

impl VmObject {
    /// Create a VMO of `size` bytes bound to `arena`.
    ///
    /// Reserves `ceil(size / PAGE_SIZE)` empty slots; no pages are
    /// committed.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` on zero size
    /// - `NoMemory` if the slot array cannot be reserved
    pub fn new(arena: Arc<PmmArena>, size: u64) -> KernelResult<Self> {
        if size == 0 {
            return Err(Status::InvalidArgs);
        }

        let page_count = pages_for(size) as usize;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(page_count)
            .map_err(|_| Status::NoMemory)?;
        slots.resize(page_count, None);

        Ok(Self {
            arena,
            inner: Mutex::new(VmoInner {
                size,
                pages: slots.into_boxed_slice(),
            }),
        })
    }

    /// Commit the page at `index`, allocating from the arena if the slot
    /// is empty.
    ///
    /// Idempotent: committing an already-committed index succeeds without
    /// touching the arena.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` if `index` is past the end of the object
    /// - `NoMemory` propagated from the arena
    pub fn commit_page(&self, index: usize) -> KernelResult<()> {
        let mut inner = self.inner.lock();

        let slot = inner.pages.get_mut(index).ok_or(Status::InvalidArgs)?;
        if slot.is_some() {
            return Ok(());
        }

        let page = self.arena.alloc_page()?;
        *slot = Some(page);
        Ok(())
    }

    /// Return every committed page to the arena and drop the slot array.
    ///
    /// Size and page count become zero. Destroying an already-destroyed
    /// object is a no-op; `Drop` calls this, so an un-destroyed VMO still
    /// returns its pages.
    pub fn destroy(&self) {
        let slots = {
            let mut inner = self.inner.lock();
            inner.size = 0;
            core::mem::take(&mut inner.pages)
        };

        for page in slots.iter().flatten() {
            if let Err(err) = self.arena.free_page(*page) {
                log::debug!("vmo: stale page {:?} on destroy: {}", page, err);
            }
        }
    }

    /// The arena this object is bound to.
    #[must_use]
    pub fn arena(&self) -> &Arc<PmmArena> {
        &self.arena
    }

    /// Size in bytes (zero after destroy).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Number of page slots (zero after destroy).
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.inner.lock().pages.len()
    }

    /// Number of slots currently holding a committed page.
    #[must_use]
    pub fn committed_count(&self) -> usize {
        self.inner.lock().pages.iter().flatten().count()
    }

    /// Check whether the slot at `index` holds a committed page.
    ///
    /// Out-of-range indices report `false`.
    #[must_use]
    pub fn is_committed(&self, index: usize) -> bool {
        self.inner
            .lock()
            .pages
            .get(index)
            .is_some_and(|slot| slot.is_some())
    }

    /// Physical address of the committed page at `index`, if any.
    #[must_use]
    pub fn committed_paddr(&self, index: usize) -> Option<PhysAddr> {
        let page = (*self.inner.lock().pages.get(index)?)?;
        self.arena.page_paddr(page)
    }
}

impl Drop for VmObject {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_common::page::PAGE_SIZE;

    fn arena(pages: u64) -> Arc<PmmArena> {
        Arc::new(PmmArena::new(PhysAddr::new(0x100_0000), pages * PAGE_SIZE).unwrap())
    }

    #[test]
    fn test_zero_size_rejected() {
        let arena = arena(4);
        assert!(matches!(
            VmObject::new(arena, 0),
            Err(Status::InvalidArgs)
        ));
    }

    #[test]
    fn test_page_count_rounds_up() {
        let arena = arena(16);
        let vmo = VmObject::new(arena, 40 * 1024).unwrap();
        assert_eq!(vmo.page_count(), 10);
        assert_eq!(vmo.size(), 40 * 1024);

        let odd = VmObject::new(vmo.arena().clone(), PAGE_SIZE + 1).unwrap();
        assert_eq!(odd.page_count(), 2);
    }

    #[test]
    fn test_commit_is_lazy() {
        let arena = arena(8);
        let vmo = VmObject::new(arena.clone(), 4 * PAGE_SIZE).unwrap();
        assert_eq!(vmo.committed_count(), 0);
        assert_eq!(arena.free_count(), 8);
    }

    #[test]
    fn test_commit_idempotent() {
        let arena = arena(8);
        let vmo = VmObject::new(arena.clone(), 4 * PAGE_SIZE).unwrap();

        vmo.commit_page(2).unwrap();
        assert!(vmo.is_committed(2));
        assert_eq!(arena.free_count(), 7);

        // Second commit must not consume another page.
        vmo.commit_page(2).unwrap();
        assert_eq!(arena.free_count(), 7);
        assert_eq!(vmo.committed_count(), 1);
    }

    #[test]
    fn test_commit_out_of_range() {
        let arena = arena(8);
        let vmo = VmObject::new(arena, 4 * PAGE_SIZE).unwrap();
        assert_eq!(vmo.commit_page(4).unwrap_err(), Status::InvalidArgs);
    }

    #[test]
    fn test_commit_propagates_exhaustion() {
        let arena = arena(1);
        let vmo = VmObject::new(arena.clone(), 2 * PAGE_SIZE).unwrap();

        vmo.commit_page(0).unwrap();
        assert_eq!(vmo.commit_page(1).unwrap_err(), Status::NoMemory);
        // Failed commit leaves the slot empty.
        assert!(!vmo.is_committed(1));
    }

    #[test]
    fn test_destroy_restores_free_count() {
        let arena = arena(8);
        let before = arena.free_count();

        let vmo = VmObject::new(arena.clone(), 4 * PAGE_SIZE).unwrap();
        vmo.commit_page(0).unwrap();
        vmo.commit_page(3).unwrap();
        assert_eq!(arena.free_count(), before - 2);

        vmo.destroy();
        assert_eq!(arena.free_count(), before);
        assert_eq!(vmo.size(), 0);
        assert_eq!(vmo.page_count(), 0);

        // Double destroy is a no-op.
        vmo.destroy();
        assert_eq!(arena.free_count(), before);
    }

    #[test]
    fn test_drop_returns_pages() {
        let arena = arena(8);
        {
            let vmo = VmObject::new(arena.clone(), 4 * PAGE_SIZE).unwrap();
            vmo.commit_page(1).unwrap();
            assert_eq!(arena.free_count(), 7);
        }
        assert_eq!(arena.free_count(), 8);
    }

    #[test]
    fn test_committed_paddr() {
        let arena = arena(8);
        let vmo = VmObject::new(arena.clone(), 4 * PAGE_SIZE).unwrap();
        assert!(vmo.committed_paddr(0).is_none());

        vmo.commit_page(0).unwrap();
        let paddr = vmo.committed_paddr(0).unwrap();
        assert!(paddr.is_page_aligned());
        assert!(paddr >= arena.base());
    }
}
