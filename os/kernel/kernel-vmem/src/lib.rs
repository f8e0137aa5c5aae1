//! # Virtual Memory Support
//!
//! Page-table management for legacy 32-bit x86 paging, raw physical memory
//! access through a temporary mapping window, and copies between address
//! spaces.
//!
//! ## What you get
//! - [`PageEntry`]: the 32-bit PDE/PTE record, and [`MapFlags`] for callers.
//! - [`PageMap`] with bounded [`DirectoryIndex`] / [`TableIndex`] accessors.
//! - [`Mmu`]: the hardware seam (active root, live tables, TLB, window).
//! - [`PageTableManager`]: map/unmap pages and page tables in any space,
//!   [`peek`](PageTableManager::peek)/[`poke`](PageTableManager::poke) physical
//!   memory, and [`transfer`](PageTableManager::transfer) between spaces.
//! - `recursive::RecursiveMmu` for the real CPU and `sim::SimulatedMmu`
//!   for host tests (`host-sim` feature).
//!
//! ## 32-bit Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31-22     | 21-12 | 11-0   |
//! | Directory | Table | Offset |
//!
//!  CR3 → Page Directory (1024 PDEs) ─┬─► PS=1 → 4 MiB page
//!                                    └─► Page Table (1024 PTEs) → 4 KiB page
//! ```
//!
//! An address space is identified by the frame of its page directory
//! ([`RootPage`]).

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod entry;
mod error;
mod manager;
mod mmu;
mod page_map;
mod phys;
mod transfer;

#[cfg(target_arch = "x86")]
pub mod recursive;
#[cfg(any(test, feature = "host-sim"))]
pub mod sim;

pub use crate::entry::{MapFlags, PageEntry};
pub use crate::error::VmemError;
pub use crate::manager::{Access, PageTableManager};
pub use crate::mmu::{Mmu, PageWindow, RootPage};
pub use crate::page_map::{DirectoryIndex, ENTRIES_PER_MAP, EntryIndex, PAGE_SIZE, PageMap, TableIndex};
pub use crate::transfer::{Direction, TransferBuffer};

/// Re-export constants as info module.
pub use kernel_info::memory as info;
