//! # Memory Regions

use bitflags::bitflags;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

bitflags! {
    /// Attributes of a [`Region`]. The bit values are part of the loader
    /// interface and must not change.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct RegionFlags: u32 {
        const READ_ONLY = 1;
        const COPY_ON_WRITE = 2;
        /// Pages are populated on first touch.
        const LAZY = 4;
        /// Backed by a fixed physical range (device memory, boot modules).
        const FIXED_PHYSICAL = 8;
        const ZERO_ON_MAP = 16;
    }
}

/// Half-open virtual range `[start, start + length)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VirtualRange {
    pub start: VirtualAddress,
    pub length: u64,
}

impl VirtualRange {
    #[must_use]
    pub const fn new(start: VirtualAddress, length: u64) -> Self {
        Self { start, length }
    }

    /// Exclusive end; saturates instead of wrapping.
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u64().saturating_add(self.length))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn contains(&self, addr: VirtualAddress) -> bool {
        self.start <= addr && addr < self.end()
    }

    /// Half-open interval intersection. Symmetric; empty ranges overlap nothing.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end() && other.start < self.end()
    }
}

/// What a region's pages are filled from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Backing {
    /// Anonymous memory.
    None,
    Physical { start: PhysicalAddress, length: u64 },
    /// A range of the program image.
    File { offset: u64, length: u64 },
}

/// A virtual range of an address space with its backing and attributes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub virt: VirtualRange,
    pub backing: Backing,
    pub flags: RegionFlags,
}

impl Region {
    #[must_use]
    pub const fn new(virt: VirtualRange, backing: Backing, flags: RegionFlags) -> Self {
        Self { virt, backing, flags }
    }

    /// An anonymous region.
    #[must_use]
    pub const fn anonymous(start: VirtualAddress, length: u64, flags: RegionFlags) -> Self {
        Self::new(VirtualRange::new(start, length), Backing::None, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, length: u64) -> VirtualRange {
        VirtualRange::new(VirtualAddress::new(start), length)
    }

    #[test]
    fn flag_values_are_stable() {
        assert_eq!(RegionFlags::READ_ONLY.bits(), 1);
        assert_eq!(RegionFlags::COPY_ON_WRITE.bits(), 2);
        assert_eq!(RegionFlags::LAZY.bits(), 4);
        assert_eq!(RegionFlags::FIXED_PHYSICAL.bits(), 8);
        assert_eq!(RegionFlags::ZERO_ON_MAP.bits(), 16);
    }

    #[test]
    fn overlap_is_half_open_and_symmetric() {
        let a = range(0x1000, 0x2000);
        let cases = [
            (range(0x1800, 0x100), true),
            (range(0x0, 0x1001), true),
            (range(0x2FFF, 0x10), true),
            (range(0x1000, 0x2000), true),
            (range(0x0, 0x1000), false),
            (range(0x3000, 0x1000), false),
            (range(0x1800, 0), false),
        ];
        for (b, expected) in cases {
            assert_eq!(a.overlaps(&b), expected, "{b:?}");
            assert_eq!(b.overlaps(&a), expected, "{b:?} (swapped)");
        }
    }

    #[test]
    fn end_saturates() {
        let r = range(0xFFFF_F000, u64::MAX);
        assert_eq!(r.end(), VirtualAddress::new(u64::MAX));
        assert!(r.contains(VirtualAddress::new(0xFFFF_FFFF)));
    }
}
