//! # Simulated MMU
//!
//! A host-side [`Mmu`] for tests. Physical memory is a vector of 4 KiB frames
//! where frame `n` lives at physical address `n * 4096`. The active root is a
//! plain register, TLB maintenance is recorded, and the temporary window
//! panics when used re-entrantly.
//!
//! Accessing a frame outside the simulated range, or a page that is not
//! mapped in the active space, panics like a machine check or a page fault
//! would.

use crate::page_map::PAGE_SIZE;
use crate::{DirectoryIndex, Mmu, PageMap, PageWindow, RootPage, TableIndex};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, Size4M, VirtualPage};

#[repr(C, align(4096))]
struct Frame([u8; PAGE_SIZE]);

/// Host simulation of physical memory and the paging unit.
pub struct SimulatedMmu {
    frames: Vec<Box<Frame>>,
    current: RootPage,
    temp: Option<PhysicalPage<Size4K>>,
    window_uses: usize,
    invalidated: Vec<VirtualPage<Size4K>>,
    full_flushes: usize,
}

impl SimulatedMmu {
    /// `frame_count` zeroed frames; frame 0 is the active page directory.
    #[must_use]
    pub fn new(frame_count: usize) -> Self {
        assert!(frame_count > 0, "need at least the root frame");
        let frames = (0..frame_count)
            .map(|_| Box::new(Frame([0; PAGE_SIZE])))
            .collect();
        Self {
            frames,
            current: PhysicalPage::containing_address(PhysicalAddress::zero()),
            temp: None,
            window_uses: 0,
            invalidated: Vec::new(),
            full_flushes: 0,
        }
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Physical page of frame number `n`.
    #[must_use]
    pub const fn frame_page(n: usize) -> PhysicalPage<Size4K> {
        PhysicalPage::containing_address(PhysicalAddress::new(n as u64 * PAGE_SIZE as u64))
    }

    /// Load a different root, as a context switch would. Flushes the TLB.
    pub fn set_current_root(&mut self, root: RootPage) {
        let _ = self.index_of(root);
        self.current = root;
        self.full_flushes += 1;
    }

    /// Contents of frame number `n`.
    #[must_use]
    pub fn frame_bytes(&self, n: usize) -> &[u8; PAGE_SIZE] {
        &self.frames[n].0
    }

    /// Whether the temporary window is currently mapped.
    #[must_use]
    pub const fn temp_in_use(&self) -> bool {
        self.temp.is_some()
    }

    /// Number of `map_temp` calls since the last reset.
    #[must_use]
    pub const fn window_uses(&self) -> usize {
        self.window_uses
    }

    pub const fn reset_window_uses(&mut self) {
        self.window_uses = 0;
    }

    /// Pages passed to `invalidate_page`, oldest first.
    #[must_use]
    pub fn invalidations(&self) -> &[VirtualPage<Size4K>] {
        &self.invalidated
    }

    #[must_use]
    pub const fn full_flushes(&self) -> usize {
        self.full_flushes
    }

    pub fn clear_invalidations(&mut self) {
        self.invalidated.clear();
        self.full_flushes = 0;
    }

    fn index_of(&self, frame: PhysicalPage<Size4K>) -> usize {
        let n = usize::try_from(frame.base().as_u64() / PAGE_SIZE as u64).unwrap_or(usize::MAX);
        assert!(
            n < self.frames.len(),
            "machine check: frame {frame} outside simulated memory"
        );
        n
    }

    fn frame_ptr(&mut self, frame: PhysicalPage<Size4K>) -> PageWindow {
        let n = self.index_of(frame);
        NonNull::from(&mut self.frames[n].0)
    }

    fn map_of(&mut self, frame: PhysicalPage<Size4K>) -> &mut PageMap {
        let n = self.index_of(frame);
        let ptr = core::ptr::from_mut::<Frame>(&mut self.frames[n]).cast::<PageMap>();
        // SAFETY: `Frame` and `PageMap` have identical size and alignment and
        // every bit pattern is a valid `PageMap`.
        unsafe { &mut *ptr }
    }
}

// SAFETY: every pointer handed out refers into `frames`, whose boxes never
// move while the simulation lives.
unsafe impl Mmu for SimulatedMmu {
    fn current_root(&self) -> RootPage {
        self.current
    }

    fn active_directory(&mut self) -> &mut PageMap {
        self.map_of(self.current)
    }

    unsafe fn active_table(&mut self, index: DirectoryIndex) -> &mut PageMap {
        let pde = self.active_directory().get(index);
        let Some(table) = pde.frame() else {
            panic!("page fault: directory slot {index:?} links no page table");
        };
        self.map_of(table)
    }

    fn invalidate_page(&mut self, page: VirtualPage<Size4K>) {
        self.invalidated.push(page);
    }

    fn invalidate_all(&mut self) {
        self.full_flushes += 1;
    }

    unsafe fn map_temp(&mut self, frame: PhysicalPage<Size4K>) -> PageWindow {
        assert!(self.temp.is_none(), "temporary window already in use");
        self.temp = Some(frame);
        self.window_uses += 1;
        self.frame_ptr(frame)
    }

    unsafe fn unmap_temp(&mut self) {
        assert!(self.temp.take().is_some(), "temporary window was not mapped");
    }

    unsafe fn active_page(&mut self, page: VirtualPage<Size4K>) -> PageWindow {
        let va = page.base();
        let pde = self.active_directory().get(DirectoryIndex::of(va));
        let frame = if let Some(large) = pde.large_frame() {
            let within = va.offset::<Size4M>().as_u64();
            PhysicalPage::containing_address(large.base() + within)
        } else {
            // SAFETY: only reached for a present, non-large directory entry.
            let pte = unsafe { self.active_table(DirectoryIndex::of(va)) }.get(TableIndex::of(va));
            assert!(pte.present(), "page fault: {va} is not mapped");
            PhysicalPage::containing_address(pte.physical_address())
        };
        self.frame_ptr(frame)
    }
}
