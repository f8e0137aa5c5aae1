//! # Memory Manager
//!
//! Ties the memory crates together into one owned context, [`MemoryManager`],
//! and implements the interfaces the rest of the kernel uses:
//!
//! - **Boot**: [`init`](MemoryManager::init) registers the pager address
//!   space, binds the bootstrap thread and seeds the frame stack from the
//!   [`BootInfo`](kernel_info::boot::BootInfo) memory map.
//! - **Program loading**: [`create_address_space`](MemoryManager::create_address_space)
//!   and [`map_segment`](MemoryManager::map_segment), one call per loadable
//!   segment described by a [`SegmentMapping`].
//! - **Signals**: [`dispatch_signal`](MemoryManager::dispatch_signal) turns
//!   exception signals into [`PageFaultRequest`]s and tears down address
//!   spaces when their last thread exits.
//! - **Memory access**: [`peek_virt`](MemoryManager::peek_virt) /
//!   [`poke_virt`](MemoryManager::poke_virt) into any address space and
//!   [`morecore`](MemoryManager::morecore) for the kernel heap.
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │       MemoryManager       │
//!                 └─┬───────┬────────┬──────┬─┘
//!   PageTableManager│  FrameStack  KernelHeap  AddressSpaceRegistry
//!         (Mmu)     │       ▲        │
//!                   └───────┴────────┘ heap-tail reclamation
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod boot;
mod error;
mod manager;
mod segment;
mod signal;

pub use crate::boot::usable_frames;
pub use crate::error::MmError;
pub use crate::manager::{MemoryManager, SharedMemoryManager};
pub use crate::segment::{FileImage, SegmentMapping};
pub use crate::signal::{
    PageFaultRequest, SIGNAL_EXCEPTION, SIGNAL_EXIT, Signal, SignalKind, SignalOutcome,
};
