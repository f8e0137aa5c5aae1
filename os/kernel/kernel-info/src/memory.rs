//! # Memory Layout

use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4M, VirtualAddress};

/// Size of a page and of a page frame.
pub const PAGE_SIZE: u64 = 4096;

/// First kernel-space virtual address. Directory entries from here upwards
/// are shared by every address space.
pub const KERNEL_SPACE_START: u64 = 0xC000_0000;

/// Start of the kernel heap managed by `morecore`.
pub const KERNEL_HEAP_START: u64 = 0xD000_0000;

/// Exclusive upper bound of the kernel heap.
pub const KERNEL_HEAP_LIMIT: u64 = 0xE000_0000;

/// The single virtual page used to transiently map arbitrary frames.
pub const TEMP_PAGE: u64 = 0xFF7F_F000;

/// Directory slot that maps the page directory onto itself.
pub const RECURSIVE_SLOT: usize = 1023;

/// Virtual base at which the active page tables appear through the self-map.
pub const PAGE_TABLES_VIEW: u64 = (RECURSIVE_SLOT as u64) << 22;

/// Virtual address of the active page directory through the self-map.
pub const PAGE_DIRECTORY_VIEW: u64 = PAGE_TABLES_VIEW + ((RECURSIVE_SLOT as u64) << 12);

/// Physical memory below this boundary (BIOS, kernel image) is never handed
/// out by the frame allocator.
pub const RESERVED_PHYS_END: u64 = 0x0040_0000; // 4 MiB

/// Number of frames the pre-mapped free frame stack can hold.
pub const FRAME_STACK_CAPACITY: usize = 256 * 1024;

/// Memory layout handed to the memory manager at construction.
///
/// The kernel uses [`MemoryLayout::DEFAULT`]; tests shrink the ranges.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryLayout {
    pub kernel_space_start: VirtualAddress,
    pub heap_start: VirtualAddress,
    pub heap_limit: VirtualAddress,
    pub temp_page: VirtualAddress,
    pub reserved_phys_end: PhysicalAddress,
    pub frame_stack_capacity: usize,
}

impl MemoryLayout {
    pub const DEFAULT: Self = Self {
        kernel_space_start: VirtualAddress::new(KERNEL_SPACE_START),
        heap_start: VirtualAddress::new(KERNEL_HEAP_START),
        heap_limit: VirtualAddress::new(KERNEL_HEAP_LIMIT),
        temp_page: VirtualAddress::new(TEMP_PAGE),
        reserved_phys_end: PhysicalAddress::new(RESERVED_PHYS_END),
        frame_stack_capacity: FRAME_STACK_CAPACITY,
    };

    /// Checks the ordering and alignment rules the memory manager relies on.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        let start = self.heap_start.as_u64();
        let limit = self.heap_limit.as_u64();
        start.is_multiple_of(PAGE_SIZE)
            && limit.is_multiple_of(PAGE_SIZE)
            && start <= limit
            && limit <= u32::MAX as u64 + 1
            && self.temp_page.as_u64().is_multiple_of(PAGE_SIZE)
            && (self.temp_page.as_u64() >= limit || self.temp_page.as_u64() < start)
            && self.temp_page.as_u64() >= self.kernel_space_start.as_u64()
            && self.temp_page.as_u64() < PAGE_TABLES_VIEW
            && self.frame_stack_capacity > 0
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const _: () = {
    assert!(KERNEL_HEAP_START >= KERNEL_SPACE_START);
    assert!(KERNEL_HEAP_LIMIT > KERNEL_HEAP_START);
    assert!(KERNEL_HEAP_START.is_multiple_of(Size4M::SIZE));
    assert!(TEMP_PAGE >= KERNEL_HEAP_LIMIT);
    assert!(TEMP_PAGE < PAGE_TABLES_VIEW);
    assert!(PAGE_DIRECTORY_VIEW == 0xFFFF_F000);
    assert!(MemoryLayout::DEFAULT.is_consistent());
};
