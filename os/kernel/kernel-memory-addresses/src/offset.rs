use crate::PageSize;
use core::fmt;
use core::marker::PhantomData;

/// Byte offset inside a page of size `S`; always below `S::SIZE`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageOffset<S: PageSize> {
    bytes: u64,
    size: PhantomData<S>,
}

impl<S: PageSize> PageOffset<S> {
    /// The offset bits of `raw`; higher bits are discarded.
    #[inline]
    #[must_use]
    pub const fn of(raw: u64) -> Self {
        Self {
            bytes: raw & S::MASK,
            size: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.bytes
    }

    /// The offset as an index into the page's bytes.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_usize(self) -> usize {
        // Below 4 MiB, so it fits any `usize` the kernel runs on.
        self.bytes as usize
    }

    /// Bytes from this offset to the end of the page.
    #[inline]
    #[must_use]
    pub const fn remaining(self) -> u64 {
        S::SIZE - self.bytes
    }
}

impl<S: PageSize> fmt::Debug for PageOffset<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:#X}/{}", self.bytes, S::NAME)
    }
}
