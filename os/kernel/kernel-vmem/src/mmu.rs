//! # Hardware Seam
//!
//! Everything the page-table manager needs from the CPU: the active root, a
//! view of the active directory and tables, TLB maintenance, and one
//! temporary mapping window for reaching arbitrary frames.

use crate::{DirectoryIndex, PageMap};
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualPage};

/// Identity of an address space: the frame of its page directory.
pub type RootPage = PhysicalPage<Size4K>;

/// A 4 KiB window onto a frame or page.
pub type PageWindow = NonNull<[u8; 4096]>;

/// Access to the memory-management unit of the running CPU.
///
/// # Safety
///
/// Implementors guarantee that every reference and pointer they hand out
/// addresses the memory described: the live directory, the live table linked
/// from a present directory entry, the frame currently in the temporary
/// window, or the page mapped at a virtual address of the active space.
pub unsafe trait Mmu {
    /// Frame of the page directory currently loaded in CR3.
    fn current_root(&self) -> RootPage;

    /// The active page directory.
    fn active_directory(&mut self) -> &mut PageMap;

    /// The active page table linked from directory slot `index`.
    ///
    /// # Safety
    /// The directory entry at `index` must be present and must not map a
    /// large page.
    unsafe fn active_table(&mut self, index: DirectoryIndex) -> &mut PageMap;

    /// Drop the cached translation for one page (`invlpg`).
    fn invalidate_page(&mut self, page: VirtualPage<Size4K>);

    /// Drop all non-global cached translations (CR3 reload).
    fn invalidate_all(&mut self);

    /// Map `frame` into the temporary window and return the window.
    ///
    /// # Safety
    /// The window must not already be in use. The pointer is valid until the
    /// matching [`unmap_temp`](Self::unmap_temp).
    unsafe fn map_temp(&mut self, frame: PhysicalPage<Size4K>) -> PageWindow;

    /// Release the temporary window.
    ///
    /// # Safety
    /// Must pair with a preceding [`map_temp`](Self::map_temp); no pointer
    /// into the window may be used afterwards.
    unsafe fn unmap_temp(&mut self);

    /// The bytes of `page` in the active address space.
    ///
    /// # Safety
    /// `page` must be mapped in the active space. The pointer is valid until
    /// that mapping changes.
    unsafe fn active_page(&mut self, page: VirtualPage<Size4K>) -> PageWindow;
}
