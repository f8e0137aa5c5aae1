//! # Physical Frame Allocation and Kernel Heap Boundary
//!
//! ## Frames
//!
//! Free 4 KiB frames live on a bounded LIFO, the [`FrameStack`]. Its slots are
//! a `'static` slice the boot code maps before the heap exists; the stack
//! never allocates and never grows past that slice. It is seeded once at boot
//! from the usable memory areas and afterwards only changes through
//! [`allocate`](FrameStack::allocate) and [`free`](FrameStack::free).
//! When the stack runs dry, a [`Reclaim`] strategy gets one chance to refill
//! it before the allocation fails.
//!
//! ## Heap
//!
//! [`KernelHeap`] tracks the end of the kernel heap inside its fixed virtual
//! window and implements `morecore`. Shrinking the heap does not unmap
//! anything; pages left mapped past the end are handed back to the frame
//! stack by [`HeapTailReclaimer`] when frames run out.
//!
//! ```text
//! heap start            heap end                    heap limit
//!     │◄──── in use ──────►│◄── stale, maybe mapped ──►│
//!                          └─ reclaim_tail scans here ─┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod error;
mod frame_stack;
mod heap;

pub use crate::error::{FrameAllocError, HeapError};
pub use crate::frame_stack::{FrameStack, NoReclaim, Reclaim};
pub use crate::heap::{HeapTailReclaimer, KernelHeap};
