//! Kernel object references
//!
//! Handle-table entries reference kernel objects through [`KernelObject`],
//! a tagged sum over the known object types. The tag lets `get` callers
//! verify the kind at lookup instead of trusting a type-erased pointer.

use alloc::sync::Arc;
use core::fmt;

use sable_cap::{KernelResult, Status};

use crate::ipc::channel::Endpoint;
use crate::memory::VmObject;

/// Discriminant identifying a kernel object's kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    /// One side of a channel.
    Endpoint = 1,
    /// A virtual memory object.
    VmObject = 2,
}

/// A typed, shared reference to a kernel object.
///
/// Cloning shares the underlying object; duplicated handle entries hold
/// clones of the same `KernelObject`.
#[derive(Clone)]
pub enum KernelObject {
    /// One side of a channel.
    Endpoint(Arc<Endpoint>),
    /// A virtual memory object.
    VmObject(Arc<VmObject>),
}

impl KernelObject {
    /// The kind tag of this object.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Endpoint(_) => ObjectKind::Endpoint,
            Self::VmObject(_) => ObjectKind::VmObject,
        }
    }

    /// View this object as a channel endpoint.
    ///
    /// # Errors
    ///
    /// `WrongType` if the object is not an endpoint.
    pub fn as_endpoint(&self) -> KernelResult<&Arc<Endpoint>> {
        match self {
            Self::Endpoint(endpoint) => Ok(endpoint),
            _ => Err(Status::WrongType),
        }
    }

    /// View this object as a VMO.
    ///
    /// # Errors
    ///
    /// `WrongType` if the object is not a VMO.
    pub fn as_vm_object(&self) -> KernelResult<&Arc<VmObject>> {
        match self {
            Self::VmObject(vmo) => Ok(vmo),
            _ => Err(Status::WrongType),
        }
    }
}

impl fmt::Debug for KernelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KernelObject::{:?}", self.kind())
    }
}
