//! # Physical and Virtual Memory Address Types
//!
//! Typed addresses for 32-bit two-level paging. Mixing up a physical and a
//! virtual address, or a 4 KiB and a 4 MiB page, is a type error.
//!
//! | Address | Page | Offset |
//! |---|---|---|
//! | [`PhysicalAddress`] | [`PhysicalPage<S>`] | [`PageOffset<S>`] |
//! | [`VirtualAddress`] | [`VirtualPage<S>`] | [`PageOffset<S>`] |
//!
//! `S` is [`Size4K`] (a page-table entry's page, or a frame) or [`Size4M`]
//! (a page table's span, or a large page).
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0020_0042);
//! let (frame, off) = pa.split::<Size4K>();
//! assert_eq!(frame.base().as_u64(), 0x0020_0000);
//! assert_eq!(off.as_u64(), 0x42);
//! assert_eq!(frame.join(off), pa);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod address;
mod offset;
mod page;
mod size;

pub use address::{PhysicalAddress, VirtualAddress};
pub use offset::PageOffset;
pub use page::{PhysicalPage, VirtualPage};
pub use size::{PageSize, Size4K, Size4M};
