//! # Address Space Registry
//!
//! Bookkeeping for every address space the kernel knows about:
//!
//! - [`AddressSpace`]: one record per page directory, holding its ordered,
//!   non-overlapping [`Region`]s, a [`TableBitmap`] of installed second-level
//!   tables and the threads bound to it.
//! - [`AddressSpaceRegistry`]: records keyed by their [`RootPage`](kernel_vmem::RootPage)
//!   and the thread-to-space map.
//!
//! The registry only records; installing page tables and mappings is left to
//! the page-table manager.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod bitmap;
mod error;
mod region;
mod registry;
mod space;

pub use crate::bitmap::TableBitmap;
pub use crate::error::RegistryError;
pub use crate::region::{Backing, Region, RegionFlags, VirtualRange};
pub use crate::registry::{AddressSpaceRegistry, Unbound};
pub use crate::space::AddressSpace;
