//! Message packets and queues
//!
//! A [`MessagePacket`] is immutable after creation: it owns copies of the
//! byte payload and the handle-ID list supplied at write time. A packet
//! belongs to exactly one [`MessageQueue`] at a time; dequeuing moves it
//! out, so no outside code ever holds a live reference to a queued packet.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use sable_cap::{Handle, KernelResult, Status};

/// An owned, immutable IPC message.
#[derive(Debug)]
pub struct MessagePacket {
    data: Box<[u8]>,
    handles: Box<[Handle]>,
}

impl MessagePacket {
    /// Create a packet by copying `data` and `handles` into owned
    /// storage. Zero-sized payloads are allowed.
    ///
    /// # Errors
    ///
    /// `NoMemory` if either copy cannot be reserved.
    pub fn new(data: &[u8], handles: &[Handle]) -> KernelResult<Self> {
        let mut data_buf = Vec::new();
        data_buf
            .try_reserve_exact(data.len())
            .map_err(|_| Status::NoMemory)?;
        data_buf.extend_from_slice(data);

        let mut handle_buf = Vec::new();
        handle_buf
            .try_reserve_exact(handles.len())
            .map_err(|_| Status::NoMemory)?;
        handle_buf.extend_from_slice(handles);

        Ok(Self {
            data: data_buf.into_boxed_slice(),
            handles: handle_buf.into_boxed_slice(),
        })
    }

    /// The byte payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The carried handle IDs.
    #[must_use]
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Number of carried handles.
    #[must_use]
    pub fn num_handles(&self) -> usize {
        self.handles.len()
    }
}

/// FIFO of message packets with an exact count.
///
/// The head is always the oldest packet; ordering is preserved per
/// writer because enqueue and dequeue happen under the channel-pair
/// lock.
#[derive(Debug, Default)]
pub struct MessageQueue {
    packets: VecDeque<MessagePacket>,
}

impl MessageQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packets: VecDeque::new(),
        }
    }

    /// Append a packet at the tail, reserving queue storage first so
    /// growth failure surfaces as `NoMemory` instead of aborting.
    ///
    /// # Errors
    ///
    /// `NoMemory` if queue storage cannot be reserved; the packet is
    /// dropped and the queue is unchanged.
    pub fn enqueue(&mut self, packet: MessagePacket) -> KernelResult<()> {
        self.packets.try_reserve(1).map_err(|_| Status::NoMemory)?;
        self.packets.push_back(packet);
        Ok(())
    }

    /// Remove and return the oldest packet.
    pub fn dequeue(&mut self) -> Option<MessagePacket> {
        self.packets.pop_front()
    }

    /// Peek at the oldest packet without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&MessagePacket> {
        self.packets.front()
    }

    /// Number of queued packets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Take every pending packet, leaving the queue empty.
    ///
    /// Used on endpoint close so the caller can dispose of carried
    /// handles outside the channel lock.
    #[must_use]
    pub fn drain(&mut self) -> VecDeque<MessagePacket> {
        core::mem::take(&mut self.packets)
    }
}
