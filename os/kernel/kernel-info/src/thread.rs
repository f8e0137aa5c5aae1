//! # Thread Identifiers

use core::fmt;

/// Kernel thread identifier.
///
/// Identifiers are 16 bits wide on the IPC wire (see the signal encoding in
/// the memory manager) but stored as `u32`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ThreadId(u32);

impl ThreadId {
    /// The bootstrap thread of the initial (pager) address space.
    pub const BOOTSTRAP: Self = Self(1);

    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tid:{}", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ThreadId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
