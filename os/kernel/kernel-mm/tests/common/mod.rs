#![allow(dead_code)]

use core::ops::Range;
use kernel_info::boot::{BootInfo, BootModule, MemoryArea, MemoryAreaKind};
use kernel_info::memory::MemoryLayout;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_mm::MemoryManager;
use kernel_vmem::PageTableManager;
use kernel_vmem::sim::SimulatedMmu;

pub const FRAMES: usize = 64;

/// Frames 20..24 hold the boot module.
pub const MODULE: Range<usize> = 20..24;

pub fn frame(n: usize) -> PhysicalPage<Size4K> {
    SimulatedMmu::frame_page(n)
}

pub fn va(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

/// Room for more frames than the layout lets the stack use.
pub fn frame_storage() -> &'static mut [PhysicalPage<Size4K>] {
    vec![frame(0); 256].leak()
}

pub fn layout() -> MemoryLayout {
    MemoryLayout {
        heap_start: va(0xD000_0000),
        heap_limit: va(0xD080_0000),
        reserved_phys_end: PhysicalAddress::new(16 * 4096),
        frame_stack_capacity: 128,
        ..MemoryLayout::DEFAULT
    }
}

/// A booted manager whose memory map offers frames `usable`.
///
/// `prepare` runs against the active space before boot, standing in for the
/// loader's initial mappings. Frames below 16 are never handed out and are
/// free for it to use.
pub fn manager(
    usable: Range<usize>,
    prepare: impl FnOnce(&mut PageTableManager<SimulatedMmu>),
) -> MemoryManager<SimulatedMmu> {
    let mut mm = MemoryManager::new(SimulatedMmu::new(FRAMES), layout(), frame_storage());
    prepare(mm.pager_mut());

    let areas = [MemoryArea {
        base: frame(usable.start).base(),
        length: ((usable.end - usable.start) * 4096) as u64,
        kind: MemoryAreaKind::Available,
    }];
    let modules = [BootModule {
        start: frame(MODULE.start).base(),
        end: frame(MODULE.end).base(),
    }];
    let boot = BootInfo {
        name: "init",
        memory_areas: &areas,
        modules: &modules,
        root_table: PhysicalAddress::zero(),
    };
    mm.init(&boot).unwrap();
    mm
}

pub fn booted() -> MemoryManager<SimulatedMmu> {
    manager(0..FRAMES, |_| {})
}
