//! Inter-process communication
//!
//! Channels are bidirectional pairs of message queues addressed by
//! endpoint handles: a write on one handle enqueues a packet on the
//! peer's queue, a read on the peer dequeues it. Delivery is FIFO per
//! direction; nothing is ordered across directions or across channels.
//!
//! Reads never block: an empty queue reports `ShouldWait` (a spin-polling
//! variant exists behind the `blocking` feature).

pub mod channel;
pub mod message;

pub use channel::{Endpoint, EndpointState};
pub use message::{MessagePacket, MessageQueue};
