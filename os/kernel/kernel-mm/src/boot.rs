//! # Boot Memory Map Filtering

use kernel_info::boot::{BootInfo, MemoryAreaKind};
use kernel_info::memory::MemoryLayout;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Every frame the boot memory map allows the allocator to hand out, in
/// ascending order.
///
/// Excluded are frames outside `Available` areas, frames below the reserved
/// low-memory boundary, frames overlapping a boot module, the initial page
/// directory, and frames a 32-bit entry cannot address.
pub fn usable_frames<'a>(
    boot: &'a BootInfo<'a>,
    layout: &'a MemoryLayout,
) -> impl Iterator<Item = PhysicalPage<Size4K>> + 'a {
    let root = boot.root_table.page::<Size4K>();
    boot.memory_areas
        .iter()
        .filter(|area| area.kind == MemoryAreaKind::Available)
        .flat_map(|area| frames_within(area.base, area.end()))
        .filter(move |frame| {
            let base = frame.base();
            base >= layout.reserved_phys_end
                && *frame != root
                && PhysicalAddress::new(base.as_u64() + 0xFFF).fits_legacy_entry()
                && !boot.modules.iter().any(|m| overlaps_module(*frame, m.start, m.end))
        })
}

/// Whole frames inside `[start, end)`.
fn frames_within(
    start: PhysicalAddress,
    end: PhysicalAddress,
) -> impl Iterator<Item = PhysicalPage<Size4K>> {
    let first = start.as_u64().div_ceil(4096);
    let last = end.as_u64() / 4096;
    (first..last).map(|n| PhysicalPage::containing_address(PhysicalAddress::new(n * 4096)))
}

fn overlaps_module(frame: PhysicalPage<Size4K>, start: PhysicalAddress, end: PhysicalAddress) -> bool {
    let base = frame.base().as_u64();
    base < end.as_u64() && start.as_u64() < base + 4096
}
