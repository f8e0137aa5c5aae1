//! Physical and virtual addresses.
//!
//! Both are plain `u64`s. Virtual addresses never exceed 32 bits once they
//! reach the paging unit; physical ones are kept wide so a PAE-sized address
//! can at least be represented and rejected.

use crate::{PageOffset, PageSize, PhysicalPage, VirtualPage};
use core::fmt;
use core::ops::{Add, AddAssign};

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident, $page:ident, $short:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }

            #[inline]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// The `S`-sized page containing this address.
            #[inline]
            #[must_use]
            pub const fn page<S: PageSize>(self) -> $page<S> {
                $page::containing_address(self)
            }

            #[inline]
            #[must_use]
            pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
                PageOffset::of(self.0)
            }

            /// Page and in-page offset; the page's `join` reverses it.
            #[inline]
            #[must_use]
            pub const fn split<S: PageSize>(self) -> ($page<S>, PageOffset<S>) {
                (self.page(), self.offset())
            }

            #[inline]
            #[must_use]
            pub const fn is_aligned<S: PageSize>(self) -> bool {
                self.0 & S::MASK == 0
            }

            #[inline]
            #[must_use]
            pub const fn align_down<S: PageSize>(self) -> Self {
                Self(self.0 & !S::MASK)
            }

            /// Round up to the next `S` boundary, or `None` past `u64::MAX`.
            #[inline]
            #[must_use]
            pub const fn checked_align_up<S: PageSize>(self) -> Option<Self> {
                match self.0.checked_add(S::MASK) {
                    Some(raw) => Some(Self(raw & !S::MASK)),
                    None => None,
                }
            }

            #[inline]
            #[must_use]
            pub const fn checked_add(self, bytes: u64) -> Option<Self> {
                match self.0.checked_add(bytes) {
                    Some(raw) => Some(Self(raw)),
                    None => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($short, "(0x{:08X})"), self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(raw: u32) -> Self {
                Self(u64::from(raw))
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        impl Add<u64> for $name {
            type Output = Self;

            #[inline]
            fn add(self, bytes: u64) -> Self {
                Self(self.0 + bytes)
            }
        }

        impl AddAssign<u64> for $name {
            #[inline]
            fn add_assign(&mut self, bytes: u64) {
                self.0 += bytes;
            }
        }
    };
}

address_type!(
    /// An address in physical memory.
    PhysicalAddress, PhysicalPage, "PA"
);

address_type!(
    /// An address as seen through the page tables of some address space.
    ///
    /// ```rust
    /// # use kernel_memory_addresses::*;
    /// let va = VirtualAddress::new(0xC000_1234);
    /// let (page, off) = va.split::<Size4K>();
    /// assert_eq!(page.base(), VirtualAddress::new(0xC000_1000));
    /// assert_eq!(page.join(off), va);
    /// ```
    VirtualAddress, VirtualPage, "VA"
);

impl PhysicalAddress {
    /// Whether a 32-bit page-table entry can hold this address.
    #[inline]
    #[must_use]
    pub const fn fits_legacy_entry(self) -> bool {
        self.0 <= u32::MAX as u64
    }
}

impl VirtualAddress {
    /// Highest address translated by two-level paging.
    pub const MAX: Self = Self(u32::MAX as u64);

    /// Whether the address lies in the 4 GiB the page tables translate.
    #[inline]
    #[must_use]
    pub const fn is_translatable(self) -> bool {
        self.0 <= Self::MAX.0
    }
}
