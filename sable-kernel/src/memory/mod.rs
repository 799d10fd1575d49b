//! Memory management
//!
//! The physical side of the nucleus: the PMM arena that owns page
//! descriptors, the lazily-committed VMO, and the page-fault resolver
//! that ties a faulting address to a commit.
//!
//! Lock order within this module: VMO → arena. No operation acquires
//! them in the other direction.

pub mod fault;
pub mod page;
pub mod pmm;
pub mod vmo;

pub use fault::{FaultFlags, PageFaultHandler};
pub use page::{PageRef, PageState};
pub use pmm::PmmArena;
pub use vmo::VmObject;
