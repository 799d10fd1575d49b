//! Handle table
//!
//! Maps opaque handle IDs to kernel objects with rights, using bucketed
//! hashing (`id % buckets`). The table is an explicit parameter of every
//! operation that uses it — there is no process-global table — so tests
//! and future per-process contexts can hold their own.
//!
//! # Invariants
//!
//! - every live ID resolves to exactly one entry
//! - IDs are unique for the table's lifetime and never the invalid
//!   sentinel; a closed ID is not reissued
//! - closing the last ID to an entry destroys the entry (the object's
//!   own destructor applies separately)
//! - duplicated entries share their object reference; rights only ever
//!   shrink across duplication

use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

use sable_cap::{Handle, KernelResult, Rights, Status};

use super::object::KernelObject;

/// Bucket count used when the caller passes zero.
pub const DEFAULT_BUCKETS: usize = 64;

struct HandleEntry {
    id: u32,
    object: KernelObject,
    rights: Rights,
    /// Live IDs pointing at this entry. Close removes the entry when
    /// this reaches zero.
    ref_count: u32,
}

struct TableInner {
    buckets: Box<[Vec<HandleEntry>]>,
    next_id: u32,
    count: usize,
}

impl TableInner {
    #[inline]
    fn bucket_of(&self, id: u32) -> usize {
        (id as usize) % self.buckets.len()
    }

    fn find(&self, id: u32) -> Option<&HandleEntry> {
        let bucket = self.bucket_of(id);
        self.buckets[bucket].iter().find(|entry| entry.id == id)
    }

    /// Next handle ID. IDs are unique for the table's lifetime; the
    /// counter skips the invalid sentinel if it ever wraps.
    fn next_handle_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = match self.next_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    /// Insert a fresh entry for `id`, reserving bucket storage first so
    /// growth failure surfaces as `NoMemory` instead of aborting.
    fn install(&mut self, id: u32, object: KernelObject, rights: Rights) -> KernelResult<()> {
        let bucket = self.bucket_of(id);
        self.buckets[bucket]
            .try_reserve(1)
            .map_err(|_| Status::NoMemory)?;
        self.buckets[bucket].push(HandleEntry {
            id,
            object,
            rights,
            ref_count: 1,
        });
        self.count += 1;
        Ok(())
    }
}

/// A per-owner table of handle entries.
pub struct HandleTable {
    inner: Mutex<TableInner>,
}

impl HandleTable {
    /// Create a table with the given bucket count (0 selects
    /// [`DEFAULT_BUCKETS`]).
    ///
    /// # Errors
    ///
    /// `NoMemory` if bucket storage cannot be reserved.
    pub fn new(buckets: usize) -> KernelResult<Self> {
        let buckets = if buckets == 0 { DEFAULT_BUCKETS } else { buckets };

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(buckets)
            .map_err(|_| Status::NoMemory)?;
        storage.resize_with(buckets, Vec::new);

        Ok(Self {
            inner: Mutex::new(TableInner {
                buckets: storage.into_boxed_slice(),
                next_id: 1,
                count: 0,
            }),
        })
    }

    /// Install `object` with `rights`, returning a fresh handle.
    ///
    /// The new entry starts with one reference.
    ///
    /// # Errors
    ///
    /// `NoMemory` if entry storage cannot be reserved.
    pub fn alloc(&self, object: KernelObject, rights: Rights) -> KernelResult<Handle> {
        let mut inner = self.inner.lock();

        let id = inner.next_handle_id();
        inner.install(id, object, rights)?;

        Ok(Handle::from_raw(id))
    }

    /// Resolve `handle`, requiring every right in `required`.
    ///
    /// # Errors
    ///
    /// - `BadHandle` if the handle is invalid or unknown
    /// - `InvalidArgs` if the entry lacks any required right
    pub fn get(&self, handle: Handle, required: Rights) -> KernelResult<KernelObject> {
        if handle.is_invalid() {
            return Err(Status::BadHandle);
        }

        let inner = self.inner.lock();
        let entry = inner.find(handle.raw()).ok_or(Status::BadHandle)?;

        if !entry.rights.contains(required) {
            return Err(Status::InvalidArgs);
        }

        Ok(entry.object.clone())
    }

    /// Rights attached to `handle`.
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is invalid or unknown.
    pub fn rights(&self, handle: Handle) -> KernelResult<Rights> {
        if handle.is_invalid() {
            return Err(Status::BadHandle);
        }

        let inner = self.inner.lock();
        let entry = inner.find(handle.raw()).ok_or(Status::BadHandle)?;
        Ok(entry.rights)
    }

    /// Drop one reference to `handle`'s entry, removing the entry when
    /// the last reference goes.
    ///
    /// Closing an unknown or invalid ID fails without side effects.
    ///
    /// # Errors
    ///
    /// `BadHandle` if the handle is invalid or unknown.
    pub fn close(&self, handle: Handle) -> KernelResult<()> {
        if handle.is_invalid() {
            return Err(Status::BadHandle);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let bucket = inner.bucket_of(handle.raw());
        let position = inner.buckets[bucket]
            .iter()
            .position(|entry| entry.id == handle.raw())
            .ok_or(Status::BadHandle)?;

        let entry = &mut inner.buckets[bucket][position];
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            inner.buckets[bucket].swap_remove(position);
            inner.count -= 1;
        }

        Ok(())
    }

    /// Create a new handle to the same object with attenuated rights.
    ///
    /// Requires `DUPLICATE` on the source; the new entry's rights are
    /// `requested ∩ source.rights`, so rights are never gained.
    ///
    /// # Errors
    ///
    /// - `BadHandle` if the source is invalid or unknown
    /// - `InvalidArgs` if the source lacks `DUPLICATE`
    /// - `NoMemory` if entry storage cannot be reserved
    pub fn duplicate(&self, handle: Handle, requested: Rights) -> KernelResult<Handle> {
        if handle.is_invalid() {
            return Err(Status::BadHandle);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let source = inner.find(handle.raw()).ok_or(Status::BadHandle)?;
        if !source.rights.has_duplicate() {
            return Err(Status::InvalidArgs);
        }

        let object = source.object.clone();
        let rights = requested.intersect(source.rights);

        let id = inner.next_handle_id();
        inner.install(id, object, rights)?;

        Ok(Handle::from_raw(id))
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    /// Check if the table has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use sable_common::page::PAGE_SIZE;
    use sable_common::PhysAddr;

    use crate::memory::{PmmArena, VmObject};

    fn vmo_object() -> KernelObject {
        let arena =
            Arc::new(PmmArena::new(PhysAddr::new(0x100_0000), 4 * PAGE_SIZE).unwrap());
        KernelObject::VmObject(Arc::new(VmObject::new(arena, PAGE_SIZE).unwrap()))
    }

    #[test]
    fn test_alloc_and_get() {
        let table = HandleTable::new(0).unwrap();
        let h = table.alloc(vmo_object(), Rights::RW).unwrap();

        assert!(h.is_valid());
        let object = table.get(h, Rights::READ).unwrap();
        assert_eq!(object.kind(), crate::cap::ObjectKind::VmObject);
        assert!(object.as_endpoint().is_err());
    }

    #[test]
    fn test_get_rights_enforced() {
        let table = HandleTable::new(0).unwrap();
        let h = table.alloc(vmo_object(), Rights::READ).unwrap();

        assert!(table.get(h, Rights::READ).is_ok());
        assert_eq!(table.get(h, Rights::WRITE).unwrap_err(), Status::InvalidArgs);
        assert_eq!(
            table.get(Handle::from_raw(999), Rights::NONE).unwrap_err(),
            Status::BadHandle
        );
        assert_eq!(
            table.get(Handle::INVALID, Rights::NONE).unwrap_err(),
            Status::BadHandle
        );
    }

    #[test]
    fn test_ids_never_reused() {
        let table = HandleTable::new(0).unwrap();
        let first = table.alloc(vmo_object(), Rights::ALL).unwrap();
        table.close(first).unwrap();

        let second = table.alloc(vmo_object(), Rights::ALL).unwrap();
        assert_ne!(first, second);
        // The stale ID no longer resolves.
        assert_eq!(
            table.get(first, Rights::NONE).unwrap_err(),
            Status::BadHandle
        );
    }

    #[test]
    fn test_close_unknown_no_side_effects() {
        let table = HandleTable::new(0).unwrap();
        let h = table.alloc(vmo_object(), Rights::ALL).unwrap();

        assert_eq!(table.close(Handle::from_raw(77)).unwrap_err(), Status::BadHandle);
        assert_eq!(table.close(Handle::INVALID).unwrap_err(), Status::BadHandle);
        assert_eq!(table.len(), 1);

        table.close(h).unwrap();
        assert_eq!(table.close(h).unwrap_err(), Status::BadHandle);
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_attenuates() {
        let table = HandleTable::new(0).unwrap();
        let id1 = table
            .alloc(vmo_object(), Rights::READ | Rights::WRITE | Rights::DUPLICATE)
            .unwrap();

        let id2 = table
            .duplicate(id1, Rights::READ | Rights::TRANSFER)
            .unwrap();
        assert_ne!(id1, id2);

        // Transfer was not on the source, so it was dropped.
        assert_eq!(table.rights(id2).unwrap(), Rights::READ);
        assert_eq!(table.get(id2, Rights::WRITE).unwrap_err(), Status::InvalidArgs);
        assert!(table.get(id2, Rights::READ).is_ok());

        // The source is untouched.
        assert!(table.get(id1, Rights::RW).is_ok());
    }

    #[test]
    fn test_duplicate_requires_right() {
        let table = HandleTable::new(0).unwrap();
        let h = table.alloc(vmo_object(), Rights::RW).unwrap();
        assert_eq!(
            table.duplicate(h, Rights::READ).unwrap_err(),
            Status::InvalidArgs
        );
    }

    #[test]
    fn test_drain_to_empty() {
        let table = HandleTable::new(8).unwrap();
        let mut handles = Vec::new();
        for _ in 0..32 {
            handles.push(table.alloc(vmo_object(), Rights::ALL).unwrap());
        }
        for h in handles {
            table.close(h).unwrap();
        }
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_bucket_collisions_resolve() {
        // A tiny table forces every entry through the same few buckets.
        let table = HandleTable::new(2).unwrap();
        let handles: Vec<Handle> = (0..16)
            .map(|_| table.alloc(vmo_object(), Rights::ALL).unwrap())
            .collect();

        for h in &handles {
            assert!(table.get(*h, Rights::ALL).is_ok());
        }
        for h in handles {
            table.close(h).unwrap();
        }
        assert!(table.is_empty());
    }
}
