//! Page-aligned bases: [`PhysicalPage`] (a frame when `S` is [`Size4K`](crate::Size4K))
//! and [`VirtualPage`].

use crate::{PageOffset, PageSize, PhysicalAddress, VirtualAddress};
use core::fmt;
use core::marker::PhantomData;

macro_rules! page_type {
    ($(#[$meta:meta])* $name:ident, $addr:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name<S: PageSize> {
            base: $addr,
            size: PhantomData<S>,
        }

        impl<S: PageSize> $name<S> {
            /// The page containing `addr`.
            #[inline]
            #[must_use]
            pub const fn containing_address(addr: $addr) -> Self {
                Self {
                    base: addr.align_down::<S>(),
                    size: PhantomData,
                }
            }

            #[inline]
            #[must_use]
            pub const fn base(self) -> $addr {
                self.base
            }

            #[inline]
            #[must_use]
            pub const fn join(self, offset: PageOffset<S>) -> $addr {
                $addr::new(self.base.as_u64() | offset.as_u64())
            }

            /// The page `n` pages further on, or `None` on overflow.
            #[inline]
            #[must_use]
            pub const fn checked_next(self, n: u64) -> Option<Self> {
                match n.checked_mul(S::SIZE) {
                    Some(bytes) => match self.base.checked_add(bytes) {
                        Some(base) => Some(Self { base, size: PhantomData }),
                        None => None,
                    },
                    None => None,
                }
            }
        }

        impl<S: PageSize> fmt::Display for $name<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}/{}", self.base, S::NAME)
            }
        }

        impl<S: PageSize> fmt::Debug for $name<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "<{}>({})"), S::NAME, self.base)
            }
        }

        impl<S: PageSize> From<$name<S>> for $addr {
            #[inline]
            fn from(page: $name<S>) -> Self {
                page.base
            }
        }

        /// Fails with the address itself when it is not `S`-aligned.
        impl<S: PageSize> TryFrom<$addr> for $name<S> {
            type Error = $addr;

            fn try_from(addr: $addr) -> Result<Self, $addr> {
                if addr.is_aligned::<S>() {
                    Ok(Self::containing_address(addr))
                } else {
                    Err(addr)
                }
            }
        }
    };
}

page_type!(
    /// A physical page of size `S`.
    PhysicalPage, PhysicalAddress
);

page_type!(
    /// A virtual page of size `S`.
    VirtualPage, VirtualAddress
);
