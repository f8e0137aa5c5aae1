//! Page-size markers for two-level 32-bit paging.

use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// A page size supported by the paging unit. Sealed; see [`Size4K`] and [`Size4M`].
pub trait PageSize:
    sealed::Sealed + Copy + Ord + Hash + fmt::Debug + fmt::Display + 'static
{
    /// Bytes per page; a power of two.
    const SIZE: u64;
    /// `log2(SIZE)`: the number of offset bits.
    const SHIFT: u32;
    const NAME: &'static str;

    /// Mask selecting the offset bits of an address.
    const MASK: u64 = Self::SIZE - 1;
}

macro_rules! page_size {
    ($(#[$meta:meta])* $name:ident, $shift:literal, $label:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SIZE: u64 = 1 << $shift;
            const SHIFT: u32 = $shift;
            const NAME: &'static str = $label;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(Self::NAME)
            }
        }
    };
}

page_size!(
    /// A 4 KiB page, mapped by a page-table entry. A physical one is a frame.
    Size4K, 12, "4K"
);

page_size!(
    /// A 4 MiB page: the span of one page table, and a large page mapped
    /// directly by a directory entry (`PS=1`).
    Size4M, 22, "4M"
);

const _: () = assert!(Size4M::SIZE == 1024 * Size4K::SIZE);
