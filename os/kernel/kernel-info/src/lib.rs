//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the memory layout constants, the boot descriptor handed
//! over by the loader, and small identifier types shared by every memory
//! management crate. It is the single source of truth for where things live in
//! the 32-bit virtual address space.
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (32-bit, two-level paging):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         User Space              │
//! KERNEL_SPACE├─────────────────────────────────┤ 0xC000_0000
//!             │   Kernel image and low memory   │
//! HEAP_START  ├─────────────────────────────────┤ 0xD000_0000
//!             │   Kernel heap (morecore)        │
//! HEAP_LIMIT  ├─────────────────────────────────┤ 0xE000_0000
//!             │   Frame stack, misc mappings    │
//! TEMP_PAGE   ├─────────────────────────────────┤ 0xFF7F_F000
//!             │   Temporary mapping window      │
//! TABLES_VIEW ├─────────────────────────────────┤ 0xFFC0_0000
//!             │   Recursive page-table view     │
//! DIR_VIEW    ├─────────────────────────────────┤ 0xFFFF_F000
//!             │   Active page directory         │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! Every address space shares the directory entries at and above
//! [`KERNEL_SPACE_START`](memory::KERNEL_SPACE_START); new spaces copy them
//! from the active one.
//!
//! ## Modules
//!
//! * [`memory`]: layout constants and the [`MemoryLayout`](memory::MemoryLayout) value.
//! * [`boot`]: the loader-to-kernel handoff ([`BootInfo`](boot::BootInfo)).
//! * [`thread`]: the [`ThreadId`](thread::ThreadId) newtype.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod thread;
