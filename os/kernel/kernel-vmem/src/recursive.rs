//! # Recursive-Mapping MMU (32-bit x86)
//!
//! The last directory slot points at the directory itself, so the active
//! directory appears at [`PAGE_DIRECTORY_VIEW`] and the table linked from slot
//! `i` appears at [`PAGE_TABLES_VIEW`]` + i * 4096`. The temporary window is a
//! fixed kernel page whose table entry is rewritten on every use; the page
//! table covering it must be linked before the first use.

use crate::{DirectoryIndex, MapFlags, Mmu, PageEntry, PageMap, PageWindow, RootPage, TableIndex};
use core::ptr::NonNull;
use kernel_info::memory::{MemoryLayout, PAGE_DIRECTORY_VIEW, PAGE_TABLES_VIEW};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress, VirtualPage};

/// [`Mmu`] for the running CPU using the recursive self-map.
pub struct RecursiveMmu {
    temp_page: VirtualPage<Size4K>,
}

impl RecursiveMmu {
    /// An MMU whose temporary window is `layout.temp_page`.
    ///
    /// # Safety
    /// Paging must be enabled with the recursive slot installed in every
    /// address space, and the page table covering the window must be linked
    /// in the kernel half.
    #[must_use]
    pub const unsafe fn new(layout: &MemoryLayout) -> Self {
        Self {
            temp_page: layout.temp_page.page::<Size4K>(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn ptr<T>(va: u64) -> *mut T {
        va as usize as *mut T
    }

    fn temp_entry(&mut self) -> (&mut PageMap, TableIndex) {
        let va = self.temp_page.base();
        // SAFETY: `new` requires the window's page table to be linked.
        let table = unsafe { self.active_table(DirectoryIndex::of(va)) };
        (table, TableIndex::of(va))
    }
}

// SAFETY: the self-map makes the views below alias exactly the live
// structures; the window entry is only ever written by this type.
unsafe impl Mmu for RecursiveMmu {
    fn current_root(&self) -> RootPage {
        let cr3: u32;
        // SAFETY: reading CR3 has no side effects at CPL0.
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        PhysicalPage::containing_address(PhysicalAddress::from(cr3))
    }

    fn active_directory(&mut self) -> &mut PageMap {
        // SAFETY: the recursive slot maps the directory at this address.
        unsafe { &mut *Self::ptr::<PageMap>(PAGE_DIRECTORY_VIEW) }
    }

    unsafe fn active_table(&mut self, index: DirectoryIndex) -> &mut PageMap {
        let va = PAGE_TABLES_VIEW + (index.as_usize() as u64) * 4096;
        // SAFETY: the caller guarantees the slot links a page table.
        unsafe { &mut *Self::ptr::<PageMap>(va) }
    }

    fn invalidate_page(&mut self, page: VirtualPage<Size4K>) {
        let p = Self::ptr::<u8>(page.base().as_u64());
        // SAFETY: `invlpg` only drops a TLB entry.
        unsafe {
            core::arch::asm!("invlpg [{}]", in(reg) p, options(nostack, preserves_flags));
        }
    }

    fn invalidate_all(&mut self) {
        // SAFETY: reloading CR3 with its own value only flushes the TLB.
        unsafe {
            core::arch::asm!(
                "mov {tmp}, cr3",
                "mov cr3, {tmp}",
                tmp = out(reg) _,
                options(nostack, preserves_flags)
            );
        }
    }

    unsafe fn map_temp(&mut self, frame: PhysicalPage<Size4K>) -> PageWindow {
        let (table, index) = self.temp_entry();
        debug_assert!(!table.get(index).present(), "temporary window already in use");
        table.set(index, PageEntry::leaf(frame.base(), MapFlags::KERNEL_RW));
        self.invalidate_page(self.temp_page);
        // SAFETY: the window address is a non-null kernel page.
        unsafe { NonNull::new_unchecked(Self::ptr(self.temp_page.base().as_u64())) }
    }

    unsafe fn unmap_temp(&mut self) {
        let (table, index) = self.temp_entry();
        table.set(index, PageEntry::new());
        self.invalidate_page(self.temp_page);
    }

    unsafe fn active_page(&mut self, page: VirtualPage<Size4K>) -> PageWindow {
        let va: VirtualAddress = page.base();
        // SAFETY: the caller guarantees `page` is mapped, and page zero is
        // never mapped.
        unsafe { NonNull::new_unchecked(Self::ptr(va.as_u64())) }
    }
}
