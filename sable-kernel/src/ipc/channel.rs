//! Channels
//!
//! A channel is a pair of endpoints, each with an inbound queue; writing
//! on one endpoint enqueues on the peer's queue. The channel is a single
//! owning aggregate: both per-side states live behind one lock, which
//! makes close-vs-write race-free, and the aggregate itself dies when the
//! last reference to either endpoint drops. Endpoints hold only their
//! side index, so there is no owning cycle between the two halves.
//!
//! Every operation takes the handle table explicitly; there is no
//! process-global table.
//!
//! # Endpoint states
//!
//! - **Paired**: both sides open; writes and reads proceed
//! - **Orphaned**: the peer closed; writes fail, reads drain what was
//!   already sent
//! - **Closed**: this side closed; everything fails
//!
//! Lock order: handle table before channel pair. The pair lock is never
//! held across a table operation.

use alloc::sync::Arc;
use core::fmt;
use spin::Mutex;

use sable_cap::{Handle, KernelResult, Rights, Status};

use crate::cap::{HandleTable, KernelObject};

use super::message::{MessagePacket, MessageQueue};

/// Observable state of a channel endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointState {
    /// Both sides open.
    Paired,
    /// The peer has closed; pending messages may still be read.
    Orphaned,
    /// This side has closed.
    Closed,
}

struct EndState {
    queue: MessageQueue,
    closed: bool,
}

impl EndState {
    const fn new() -> Self {
        Self {
            queue: MessageQueue::new(),
            closed: false,
        }
    }
}

struct ChannelInner {
    ends: [EndState; 2],
}

/// The shared channel aggregate. One lock covers both sides.
struct Channel {
    inner: Mutex<ChannelInner>,
}

/// One side of a channel.
///
/// Endpoints are installed in a handle table at creation with
/// `READ | WRITE | TRANSFER` and reached through [`write`], [`read`],
/// [`peek`] and [`close`].
pub struct Endpoint {
    channel: Arc<Channel>,
    side: usize,
}

impl Endpoint {
    /// Current state of this endpoint.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        let inner = self.channel.inner.lock();
        if inner.ends[self.side].closed {
            EndpointState::Closed
        } else if inner.ends[self.side ^ 1].closed {
            EndpointState::Orphaned
        } else {
            EndpointState::Paired
        }
    }

    /// Number of messages waiting on this endpoint's inbound queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.channel.inner.lock().ends[self.side].queue.len()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("side", &self.side)
            .field("state", &self.state())
            .finish()
    }
}

/// Resolve `handle` to a channel endpoint with the required rights.
fn resolve(table: &HandleTable, handle: Handle, required: Rights) -> KernelResult<Arc<Endpoint>> {
    let object = table.get(handle, required)?;
    Ok(object.as_endpoint()?.clone())
}

/// Create a channel and install both endpoints in `table`.
///
/// Each returned handle carries `READ | WRITE | TRANSFER`.
///
/// # Errors
///
/// `NoMemory` if either entry cannot be installed; a half-installed
/// pair is rolled back.
pub fn create(table: &HandleTable) -> KernelResult<(Handle, Handle)> {
    let channel = Arc::new(Channel {
        inner: Mutex::new(ChannelInner {
            ends: [EndState::new(), EndState::new()],
        }),
    });

    let first = Arc::new(Endpoint {
        channel: channel.clone(),
        side: 0,
    });
    let second = Arc::new(Endpoint { channel, side: 1 });

    let handle0 = table.alloc(KernelObject::Endpoint(first), Rights::CHANNEL_DEFAULT)?;
    let handle1 = match table.alloc(KernelObject::Endpoint(second), Rights::CHANNEL_DEFAULT) {
        Ok(handle) => handle,
        Err(err) => {
            let _ = table.close(handle0);
            return Err(err);
        }
    };

    log::trace!("channel: created pair ({}, {})", handle0, handle1);
    Ok((handle0, handle1))
}

/// Write a message to the peer of `handle`.
///
/// The payload and handle list are copied into a packet and enqueued on
/// the **peer's** inbound queue. A failed write enqueues nothing.
///
/// # Errors
///
/// - `BadHandle` if `handle` is unknown, or the endpoint or its peer is
///   closed, or a carried handle is unknown
/// - `InvalidArgs` if `handle` lacks `WRITE` or a carried handle lacks
///   `TRANSFER`
/// - `WrongType` if `handle` does not name a channel endpoint
/// - `NoMemory` if packet or queue storage cannot be reserved
pub fn write(
    table: &HandleTable,
    handle: Handle,
    data: &[u8],
    handles: &[Handle],
) -> KernelResult<()> {
    let endpoint = resolve(table, handle, Rights::WRITE)?;

    // Carried handles must resolve and be transferable before anything
    // is queued.
    for &carried in handles {
        table.get(carried, Rights::TRANSFER)?;
    }

    let mut inner = endpoint.channel.inner.lock();
    let peer = endpoint.side ^ 1;
    if inner.ends[endpoint.side].closed || inner.ends[peer].closed {
        return Err(Status::BadHandle);
    }

    let packet = MessagePacket::new(data, handles)?;
    inner.ends[peer].queue.enqueue(packet)?;

    log::trace!(
        "channel: {} queued {} bytes, {} handles",
        handle,
        data.len(),
        handles.len()
    );
    Ok(())
}

/// Read the oldest message waiting on `handle`.
///
/// On success the payload and handle list are copied into the caller's
/// buffers and the actual sizes returned. A failed read dequeues
/// nothing; in particular an undersized buffer leaves the packet queued
/// (size it with [`peek`]).
///
/// # Errors
///
/// - `BadHandle` if `handle` is unknown or the endpoint is closed
/// - `InvalidArgs` if `handle` lacks `READ`
/// - `WrongType` if `handle` does not name a channel endpoint
/// - `ShouldWait` if the queue is empty
/// - `Truncated` if either caller buffer is smaller than the packet
pub fn read(
    table: &HandleTable,
    handle: Handle,
    data_buf: &mut [u8],
    handles_buf: &mut [Handle],
) -> KernelResult<(usize, usize)> {
    let endpoint = resolve(table, handle, Rights::READ)?;

    let mut inner = endpoint.channel.inner.lock();
    let end = &mut inner.ends[endpoint.side];
    if end.closed {
        return Err(Status::BadHandle);
    }

    let Some(head) = end.queue.peek() else {
        return Err(Status::ShouldWait);
    };

    let data_size = head.data_size();
    let num_handles = head.num_handles();
    if data_buf.len() < data_size || handles_buf.len() < num_handles {
        return Err(Status::Truncated);
    }

    let packet = end
        .queue
        .dequeue()
        .expect("queue head vanished under the pair lock");
    data_buf[..data_size].copy_from_slice(packet.data());
    handles_buf[..num_handles].copy_from_slice(packet.handles());

    Ok((data_size, num_handles))
}

/// Report the byte and handle counts of the oldest waiting message
/// without dequeuing it.
///
/// # Errors
///
/// As [`read`], except `Truncated` cannot occur.
pub fn peek(table: &HandleTable, handle: Handle) -> KernelResult<(usize, usize)> {
    let endpoint = resolve(table, handle, Rights::READ)?;

    let inner = endpoint.channel.inner.lock();
    let end = &inner.ends[endpoint.side];
    if end.closed {
        return Err(Status::BadHandle);
    }

    end.queue
        .peek()
        .map(|packet| (packet.data_size(), packet.num_handles()))
        .ok_or(Status::ShouldWait)
}

/// Close the endpoint named by `handle`.
///
/// Marks the side closed (orphaning the peer), discards its pending
/// messages, closes every handle those messages carried, and closes the
/// table entry. Any rights suffice.
///
/// # Errors
///
/// - `BadHandle` if `handle` is unknown
/// - `WrongType` if `handle` does not name a channel endpoint
pub fn close(table: &HandleTable, handle: Handle) -> KernelResult<()> {
    let endpoint = resolve(table, handle, Rights::NONE)?;

    let drained = {
        let mut inner = endpoint.channel.inner.lock();
        let end = &mut inner.ends[endpoint.side];
        end.closed = true;
        end.queue.drain()
    };

    // Dispose of carried handles outside the pair lock; the table lock
    // is never taken under it.
    if !drained.is_empty() {
        log::trace!(
            "channel: {} discarding {} pending packets on close",
            handle,
            drained.len()
        );
    }
    for packet in &drained {
        for &carried in packet.handles() {
            if table.close(carried).is_err() {
                log::debug!("channel: stale handle {} in discarded packet", carried);
            }
        }
    }

    table.close(handle)
}

/// Read, spinning until a message arrives.
///
/// Polls [`read`] while the queue is empty. Returns `BadHandle` once the
/// peer has closed and the queue is drained, since no further message
/// can arrive.
#[cfg(feature = "blocking")]
pub fn read_blocking(
    table: &HandleTable,
    handle: Handle,
    data_buf: &mut [u8],
    handles_buf: &mut [Handle],
) -> KernelResult<(usize, usize)> {
    let endpoint = resolve(table, handle, Rights::READ)?;

    loop {
        match read(table, handle, data_buf, handles_buf) {
            Err(Status::ShouldWait) => {
                if endpoint.state() != EndpointState::Paired {
                    return Err(Status::BadHandle);
                }
                core::hint::spin_loop();
            }
            other => return other,
        }
    }
}
