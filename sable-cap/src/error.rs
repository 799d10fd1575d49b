//! Status codes
//!
//! Every fallible nucleus operation returns [`KernelResult`], whose error
//! arm is [`Status`]. Zero is success, negative values are errors; the
//! numeric mapping is stable so the codes can cross an ABI boundary, and
//! [`Status::name`] gives a stable textual mapping for diagnostics.

use core::fmt;

/// Nucleus-wide status codes.
///
/// Errors are surfaced, never recovered, at each layer: an operation that
/// fails leaves its object's invariants exactly as they were before the
/// call.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use = "status codes must be checked"]
pub enum Status {
    /// Success.
    Ok = 0,

    /// Valid arguments but no matching resource (e.g. a fault past the
    /// end of a VMO).
    NotFound = -3,
    /// Internal allocation failed, or the arena's free list is empty.
    NoMemory = -4,
    /// Caller violated a precondition: out-of-range index, unaligned
    /// base, freeing an already-free page, insufficient rights.
    InvalidArgs = -10,
    /// Handle unknown or closed, or the endpoint's peer is gone in a
    /// context that requires it.
    BadHandle = -11,
    /// The entry's object is not of the expected kind.
    WrongType = -12,
    /// Caller buffer too small for the pending packet; nothing was
    /// dequeued.
    Truncated = -16,
    /// Non-blocking read found an empty queue; retry once the peer has
    /// written.
    ShouldWait = -22,
}

impl Status {
    /// Convert to the raw i32 code.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this represents success.
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if this represents an error.
    #[inline]
    pub const fn is_err(self) -> bool {
        !self.is_ok()
    }

    /// Try to convert from a raw i32 code.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            -3 => Some(Self::NotFound),
            -4 => Some(Self::NoMemory),
            -10 => Some(Self::InvalidArgs),
            -11 => Some(Self::BadHandle),
            -12 => Some(Self::WrongType),
            -16 => Some(Self::Truncated),
            -22 => Some(Self::ShouldWait),
            _ => None,
        }
    }

    /// Stable textual mapping for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::NotFound => "NotFound",
            Self::NoMemory => "NoMemory",
            Self::InvalidArgs => "InvalidArgs",
            Self::BadHandle => "BadHandle",
            Self::WrongType => "WrongType",
            Self::Truncated => "Truncated",
            Self::ShouldWait => "ShouldWait",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result type for nucleus operations.
pub type KernelResult<T> = Result<T, Status>;
