//! Physical memory manager
//!
//! A [`PmmArena`] owns one contiguous physical range and hands out pages
//! from a dense descriptor array. The free list is index-linked and LIFO:
//! allocation pops the most recently freed page, which keeps reuse
//! cache-friendly and page identity stable across alloc/free cycles.
//! Allocation never scans and free never coalesces.
//!
//! # Invariants
//!
//! - `free_count` always equals the number of `Free` descriptors and the
//!   length of the free list
//! - a descriptor is `Free` iff its `ref_count` is zero
//! - descriptor index ↔ physical address is a bijection
//!   (`paddr = base + index * PAGE_SIZE`)
//!
//! Release is reference-counted: `free_page` drops one reference, and only
//! the final release returns the page to the free list. Callers that alias
//! a page take an extra reference with [`PmmArena::retain_page`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

use sable_cap::{KernelResult, Status};
use sable_common::page::{is_page_multiple, PAGE_SIZE};
use sable_common::PhysAddr;

use super::page::{PageDescriptor, PageRef, PageState};

/// A physical-memory arena.
///
/// All operations take the arena's monitor lock; the arena stays
/// self-consistent after any failed call.
pub struct PmmArena {
    base: PhysAddr,
    size: u64,
    inner: Mutex<ArenaInner>,
}

struct ArenaInner {
    pages: Box<[PageDescriptor]>,
    free_head: Option<u32>,
    free_count: usize,
}

impl PmmArena {
    /// Create an arena covering `size` bytes of physical memory at `base`.
    ///
    /// Every page starts `Free` and on the free list.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` if `base` is not page-aligned, or `size` is zero or
    ///   not a multiple of the page size
    /// - `NoMemory` if descriptor storage cannot be reserved
    pub fn new(base: PhysAddr, size: u64) -> KernelResult<Self> {
        if !base.is_page_aligned() || size == 0 || !is_page_multiple(size) {
            return Err(Status::InvalidArgs);
        }

        let page_count = (size / PAGE_SIZE) as usize;

        let mut pages = Vec::new();
        pages
            .try_reserve_exact(page_count)
            .map_err(|_| Status::NoMemory)?;
        for index in 0..page_count {
            pages.push(PageDescriptor::free(base.add_pages(index as u64)));
        }

        // Link the free list the way init walks the array: ascending, each
        // page pushed at the head, so the highest page is allocated first.
        let mut free_head = None;
        for (index, page) in pages.iter_mut().enumerate() {
            page.next = free_head;
            free_head = Some(index as u32);
        }

        log::info!("pmm: arena {} covering {} pages", base, page_count);

        Ok(Self {
            base,
            size,
            inner: Mutex::new(ArenaInner {
                pages: pages.into_boxed_slice(),
                free_head,
                free_count: page_count,
            }),
        })
    }

    /// Allocate one page.
    ///
    /// The page comes off the head of the free list with state
    /// `Allocated` and a reference count of one.
    ///
    /// # Errors
    ///
    /// `NoMemory` when the free list is empty.
    pub fn alloc_page(&self) -> KernelResult<PageRef> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(index) = inner.free_head else {
            log::debug!("pmm: arena {} exhausted", self.base);
            return Err(Status::NoMemory);
        };

        let page = &mut inner.pages[index as usize];
        inner.free_head = page.next;
        page.state = PageState::Allocated;
        page.ref_count = 1;
        page.next = None;
        inner.free_count -= 1;

        Ok(PageRef::from_index(index))
    }

    /// Take an additional reference on an allocated page.
    ///
    /// Each reference must eventually be released with
    /// [`free_page`](Self::free_page); only the final release frees the
    /// page.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` if the reference is out of range or the page is not
    /// currently allocated.
    pub fn retain_page(&self, page: PageRef) -> KernelResult<()> {
        let mut inner = self.inner.lock();
        let desc = inner
            .pages
            .get_mut(page.index() as usize)
            .ok_or(Status::InvalidArgs)?;

        if desc.state == PageState::Free || desc.ref_count == 0 {
            return Err(Status::InvalidArgs);
        }

        desc.ref_count += 1;
        Ok(())
    }

    /// Release one reference on a page.
    ///
    /// While references remain the page stays allocated; the final
    /// release transitions it to `Free` and pushes it on the free list.
    ///
    /// # Errors
    ///
    /// `InvalidArgs` if the reference is out of range, the page is
    /// already `Free`, or its reference count is zero.
    pub fn free_page(&self, page: PageRef) -> KernelResult<()> {
        let index = page.index();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let desc = inner
            .pages
            .get_mut(index as usize)
            .ok_or(Status::InvalidArgs)?;

        if desc.state == PageState::Free || desc.ref_count == 0 {
            return Err(Status::InvalidArgs);
        }

        desc.ref_count -= 1;
        if desc.ref_count > 0 {
            return Ok(());
        }

        desc.state = PageState::Free;
        desc.next = inner.free_head;
        inner.free_head = Some(index);
        inner.free_count += 1;

        Ok(())
    }

    /// Number of pages currently free.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.inner.lock().free_count
    }

    /// Total number of pages managed by this arena.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.inner.lock().pages.len()
    }

    /// Base physical address of the arena.
    #[must_use]
    pub fn base(&self) -> PhysAddr {
        self.base
    }

    /// Size of the arena in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Physical address of a page, or `None` if out of range.
    #[must_use]
    pub fn page_paddr(&self, page: PageRef) -> Option<PhysAddr> {
        let inner = self.inner.lock();
        inner.pages.get(page.index() as usize).map(|desc| desc.paddr)
    }

    /// Current state of a page, or `None` if out of range.
    #[must_use]
    pub fn page_state(&self, page: PageRef) -> Option<PageState> {
        let inner = self.inner.lock();
        inner.pages.get(page.index() as usize).map(|desc| desc.state)
    }

    /// Recount the free descriptors and walk the free list, checking both
    /// against `free_count`.
    ///
    /// This is O(n) and intended for tests and debug assertions only.
    #[must_use]
    pub fn verify_invariants(&self) -> bool {
        let inner = self.inner.lock();

        let free_by_state = inner
            .pages
            .iter()
            .filter(|desc| desc.state == PageState::Free)
            .count();

        let mut list_len = 0;
        let mut cursor = inner.free_head;
        while let Some(index) = cursor {
            list_len += 1;
            if list_len > inner.pages.len() {
                return false;
            }
            cursor = inner.pages[index as usize].next;
        }

        free_by_state == inner.free_count && list_len == inner.free_count
    }
}

impl fmt::Debug for PmmArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmmArena")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: PhysAddr = PhysAddr::new(0x100_0000);

    fn arena(pages: u64) -> PmmArena {
        PmmArena::new(BASE, pages * PAGE_SIZE).expect("arena init")
    }

    #[test]
    fn test_init_rejects_bad_geometry() {
        assert_eq!(
            PmmArena::new(PhysAddr::new(0x1001), PAGE_SIZE).unwrap_err(),
            Status::InvalidArgs
        );
        assert_eq!(PmmArena::new(BASE, 0).unwrap_err(), Status::InvalidArgs);
        assert_eq!(
            PmmArena::new(BASE, PAGE_SIZE + 1).unwrap_err(),
            Status::InvalidArgs
        );
    }

    #[test]
    fn test_init_all_free() {
        let arena = arena(8);
        assert_eq!(arena.free_count(), 8);
        assert_eq!(arena.total_count(), 8);
        assert!(arena.verify_invariants());
    }

    #[test]
    fn test_paddr_bijection() {
        let arena = arena(4);
        let page = arena.alloc_page().unwrap();
        let paddr = arena.page_paddr(page).unwrap();
        assert_eq!(
            paddr.as_u64(),
            BASE.as_u64() + u64::from(page.index()) * PAGE_SIZE
        );
    }

    #[test]
    fn test_alloc_free_round_trip() {
        let arena = arena(4);
        let before = arena.free_count();

        let page = arena.alloc_page().unwrap();
        assert_eq!(arena.page_state(page), Some(PageState::Allocated));
        assert_eq!(arena.free_count(), before - 1);

        arena.free_page(page).unwrap();
        assert_eq!(arena.page_state(page), Some(PageState::Free));
        assert_eq!(arena.free_count(), before);
        assert!(arena.verify_invariants());
    }

    #[test]
    fn test_lifo_reuse() {
        let arena = arena(4);
        let a = arena.alloc_page().unwrap();
        let _b = arena.alloc_page().unwrap();

        arena.free_page(a).unwrap();
        let again = arena.alloc_page().unwrap();
        assert_eq!(again.index(), a.index());
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        // init(base=0x1_000_000, size=10 pages); allocate 10, then fail,
        // free the 5th, and get the same page back.
        let arena = PmmArena::new(PhysAddr::new(0x100_0000), 10 * PAGE_SIZE).unwrap();

        let mut pages = alloc::vec::Vec::new();
        for _ in 0..10 {
            pages.push(arena.alloc_page().unwrap());
        }
        assert_eq!(arena.free_count(), 0);
        assert_eq!(arena.alloc_page().unwrap_err(), Status::NoMemory);

        let fifth = pages[4];
        arena.free_page(fifth).unwrap();
        assert_eq!(arena.free_count(), 1);

        let again = arena.alloc_page().unwrap();
        assert_eq!(again.index(), fifth.index());
        assert!(arena.verify_invariants());
    }

    #[test]
    fn test_double_free_rejected() {
        let arena = arena(2);
        let page = arena.alloc_page().unwrap();
        arena.free_page(page).unwrap();
        assert_eq!(arena.free_page(page).unwrap_err(), Status::InvalidArgs);
        assert!(arena.verify_invariants());
    }

    #[test]
    fn test_retain_defers_release() {
        let arena = arena(2);
        let page = arena.alloc_page().unwrap();
        arena.retain_page(page).unwrap();

        // First release drops the alias; the page stays allocated.
        arena.free_page(page).unwrap();
        assert_eq!(arena.page_state(page), Some(PageState::Allocated));
        assert_eq!(arena.free_count(), 1);

        // Final release frees it.
        arena.free_page(page).unwrap();
        assert_eq!(arena.page_state(page), Some(PageState::Free));
        assert_eq!(arena.free_count(), 2);
    }

    #[test]
    fn test_retain_free_page_rejected() {
        let arena = arena(2);
        let page = arena.alloc_page().unwrap();
        arena.free_page(page).unwrap();
        assert_eq!(arena.retain_page(page).unwrap_err(), Status::InvalidArgs);
    }

    #[test]
    fn test_out_of_range_ref_rejected() {
        let arena = arena(2);
        let bogus = PageRef::from_index(99);
        assert_eq!(arena.free_page(bogus).unwrap_err(), Status::InvalidArgs);
        assert_eq!(arena.retain_page(bogus).unwrap_err(), Status::InvalidArgs);
        assert!(arena.page_paddr(bogus).is_none());
    }
}
