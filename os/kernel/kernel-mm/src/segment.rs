//! # Loadable Segments
//!
//! The contract between the program loader and the memory manager. The
//! loader parses program headers itself and hands over one
//! [`SegmentMapping`] per loadable segment.

use kernel_aspace::RegionFlags;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// File contents of a segment, already resident in physical memory (a boot
/// module).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FileImage {
    /// Physical address of the segment's first file byte; page aligned.
    pub phys: PhysicalAddress,
    /// Bytes of the segment present in the file.
    pub size: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SegmentMapping {
    /// Page-aligned virtual start.
    pub vaddr: VirtualAddress,
    /// Size in memory. Pages past the file image are zero filled.
    pub mem_size: u64,
    /// `None` for a pure zero-fill segment.
    pub file: Option<FileImage>,
    pub flags: RegionFlags,
}

impl SegmentMapping {
    /// Number of pages the segment spans.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        self.mem_size.div_ceil(4096)
    }

    /// Physical page backing page `index`, or `None` if it is zero filled.
    #[must_use]
    pub fn file_page(&self, index: u64) -> Option<PhysicalAddress> {
        let file = self.file?;
        let offset = index * 4096;
        (offset < file.size).then(|| file.phys + offset)
    }
}
