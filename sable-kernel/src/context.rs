//! Kernel context
//!
//! There is no process-global state in the nucleus: every operation takes
//! its handle table (and arena) explicitly. [`KernelContext`] bundles one
//! arena with one handle table so embedders and tests have a single value
//! to thread around, plus thin delegating wrappers for the channel calls.

use alloc::sync::Arc;

use sable_cap::{Handle, KernelResult};

use crate::cap::HandleTable;
use crate::config::KernelConfig;
use crate::ipc::channel;
use crate::memory::{PmmArena, VmObject};

/// One owner's view of the nucleus: an arena plus a handle table.
///
/// Created at process start, dropped at process end; dropping the context
/// drops the table (closing nothing explicitly — entries die with it) and
/// releases the arena once no VMO still references it.
pub struct KernelContext {
    arena: Arc<PmmArena>,
    table: HandleTable,
}

impl KernelContext {
    /// Build a context from a validated configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidArgs` from configuration validation
    /// - `NoMemory` if arena or table storage cannot be reserved
    pub fn new(config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        let arena = Arc::new(PmmArena::new(config.arena_base, config.arena_size)?);
        let table = HandleTable::new(config.handle_buckets)?;
        Ok(Self { arena, table })
    }

    /// The context's arena.
    #[must_use]
    pub fn arena(&self) -> &Arc<PmmArena> {
        &self.arena
    }

    /// The context's handle table.
    #[must_use]
    pub fn table(&self) -> &HandleTable {
        &self.table
    }

    /// Create a VMO of `size` bytes backed by this context's arena.
    pub fn create_vmo(&self, size: u64) -> KernelResult<Arc<VmObject>> {
        Ok(Arc::new(VmObject::new(self.arena.clone(), size)?))
    }

    /// Create a channel; both endpoint handles land in this context's
    /// table.
    pub fn channel_create(&self) -> KernelResult<(Handle, Handle)> {
        channel::create(&self.table)
    }

    /// Write a message to the peer of `handle`.
    pub fn channel_write(
        &self,
        handle: Handle,
        data: &[u8],
        handles: &[Handle],
    ) -> KernelResult<()> {
        channel::write(&self.table, handle, data, handles)
    }

    /// Read the oldest message waiting on `handle`.
    pub fn channel_read(
        &self,
        handle: Handle,
        data_buf: &mut [u8],
        handles_buf: &mut [Handle],
    ) -> KernelResult<(usize, usize)> {
        channel::read(&self.table, handle, data_buf, handles_buf)
    }

    /// Close the endpoint named by `handle`.
    pub fn channel_close(&self, handle: Handle) -> KernelResult<()> {
        channel::close(&self.table, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_common::page::PAGE_SIZE;
    use sable_common::PhysAddr;

    #[test]
    fn test_context_round_trip() {
        let ctx = KernelContext::new(KernelConfig::new(
            PhysAddr::new(0x100_0000),
            16 * PAGE_SIZE,
        ))
        .unwrap();

        let (h0, h1) = ctx.channel_create().unwrap();
        ctx.channel_write(h0, b"ping", &[]).unwrap();

        let mut data = [0u8; 8];
        let mut handles = [Handle::INVALID; 1];
        let (n, _) = ctx.channel_read(h1, &mut data, &mut handles).unwrap();
        assert_eq!(&data[..n], b"ping");

        ctx.channel_close(h0).unwrap();
        ctx.channel_close(h1).unwrap();
        assert!(ctx.table().is_empty());
    }

    #[test]
    fn test_context_vmo_uses_context_arena() {
        let ctx = KernelContext::new(KernelConfig::new(
            PhysAddr::new(0x100_0000),
            8 * PAGE_SIZE,
        ))
        .unwrap();

        let vmo = ctx.create_vmo(2 * PAGE_SIZE).unwrap();
        vmo.commit_page(0).unwrap();
        assert_eq!(ctx.arena().free_count(), 7);
    }

    #[test]
    fn test_bad_config_rejected() {
        assert!(KernelContext::new(KernelConfig::new(PhysAddr::new(1), PAGE_SIZE)).is_err());
    }
}
