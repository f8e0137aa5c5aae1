//! # Kernel Boot Information
//!
//! The descriptor the loader hands to the kernel: a memory-area list, the
//! loaded modules, a name string and the physical address of the initial
//! top-level page table.

use kernel_memory_addresses::PhysicalAddress;

/// Type tag of a boot memory area. Values follow the multiboot convention.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemoryAreaKind {
    /// RAM the kernel may hand out.
    Available = 1,
    Reserved = 2,
    AcpiReclaimable = 3,
    AcpiNvs = 4,
    Defective = 5,
}

impl MemoryAreaKind {
    /// Unknown tags are treated as reserved.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Available,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Defective,
            _ => Self::Reserved,
        }
    }
}

/// One entry of the boot memory map.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryArea {
    pub base: PhysicalAddress,
    /// Length in bytes.
    pub length: u64,
    pub kind: MemoryAreaKind,
}

impl MemoryArea {
    /// Exclusive end of the area, saturating at `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64().saturating_add(self.length))
    }
}

/// A module (program image) loaded into physical memory by the loader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootModule {
    pub start: PhysicalAddress,
    /// Exclusive end.
    pub end: PhysicalAddress,
}

impl BootModule {
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.start <= addr && addr < self.end
    }
}

/// Everything the memory manager needs from the loader.
#[derive(Debug, Clone, Copy)]
pub struct BootInfo<'a> {
    pub name: &'a str,
    pub memory_areas: &'a [MemoryArea],
    pub modules: &'a [BootModule],
    /// Physical base of the active top-level page table.
    pub root_table: PhysicalAddress,
}
