//! Opaque handle IDs
//!
//! A handle is a non-zero `u32` naming an entry in a handle table. The
//! value 0 is the reserved invalid sentinel. IDs are opaque to their
//! holder: only the owning table can resolve them, and the numeric value
//! carries no meaning beyond identity.

use core::fmt;

/// An opaque handle ID.
///
/// IDs are unique within their table's lifetime: a closed ID is never
/// reissued, so a stale handle fails to resolve instead of silently
/// naming a different object.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The invalid handle sentinel.
    pub const INVALID: Self = Self(0);

    /// Create a handle from its raw ID.
    ///
    /// Raw value 0 produces [`Handle::INVALID`].
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw ID value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }

    /// Check if this is a potentially valid (non-sentinel) handle.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle::INVALID")
        } else {
            write!(f, "Handle({})", self.0)
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "invalid")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_sentinel() {
        assert!(Handle::INVALID.is_invalid());
        assert!(!Handle::INVALID.is_valid());
        assert_eq!(Handle::from_raw(0), Handle::INVALID);
    }

    #[test]
    fn test_valid_handle() {
        let h = Handle::from_raw(42);
        assert!(h.is_valid());
        assert_eq!(h.raw(), 42);
    }
}
