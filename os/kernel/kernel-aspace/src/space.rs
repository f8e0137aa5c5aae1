//! # Address Space Records

use crate::{Region, RegionFlags, TableBitmap, VirtualRange};
use alloc::collections::{BTreeMap, BTreeSet};
use kernel_info::thread::ThreadId;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{DirectoryIndex, RootPage};

/// Bookkeeping for one address space, identified by its page directory.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    root: RootPage,
    /// Regions keyed by their start address.
    regions: BTreeMap<VirtualAddress, Region>,
    tables: TableBitmap,
    threads: BTreeSet<ThreadId>,
}

impl AddressSpace {
    /// An empty record for the space whose page directory lives in `root`.
    #[must_use]
    pub const fn new(root: RootPage) -> Self {
        Self {
            root,
            regions: BTreeMap::new(),
            tables: TableBitmap::new(),
            threads: BTreeSet::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> RootPage {
        self.root
    }

    /// Regions in ascending address order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// An existing region intersecting `range`, if any.
    ///
    /// Regions are disjoint and non-empty, so if any region intersects
    /// `range` then the last one starting before `range.end()` does.
    #[must_use]
    pub fn overlapping(&self, range: &VirtualRange) -> Option<&Region> {
        if range.is_empty() {
            return None;
        }
        self.regions
            .range(..range.end())
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.virt.overlaps(range))
    }

    /// The region containing `virt`.
    #[must_use]
    pub fn find(&self, virt: VirtualAddress) -> Option<&Region> {
        self.regions
            .range(..=virt)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.virt.contains(virt))
    }

    /// Insert `region` unless it overlaps an existing one; returns the
    /// conflicting region otherwise.
    pub(crate) fn insert_region(&mut self, region: Region) -> Result<(), Region> {
        if let Some(existing) = self.overlapping(&region.virt) {
            return Err(*existing);
        }
        self.regions.insert(region.virt.start, region);
        Ok(())
    }

    /// Remove the region starting exactly at `start`.
    pub fn remove_region(&mut self, start: VirtualAddress) -> Option<Region> {
        self.regions.remove(&start)
    }

    /// Whether any region of this space has `flags` set for `virt`.
    #[must_use]
    pub fn has_flags(&self, virt: VirtualAddress, flags: RegionFlags) -> bool {
        self.find(virt).is_some_and(|r| r.flags.contains(flags))
    }

    #[must_use]
    pub const fn table_bitmap(&self) -> &TableBitmap {
        &self.tables
    }

    /// Whether a second-level table is recorded for the 4 MiB slot of `virt`.
    #[must_use]
    pub const fn table_slot_status(&self, virt: VirtualAddress) -> bool {
        self.tables.get(DirectoryIndex::of(virt))
    }

    pub const fn set_table_slot_status(&mut self, virt: VirtualAddress, populated: bool) {
        self.tables.set(DirectoryIndex::of(virt), populated);
    }

    /// Threads bound to this space.
    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.iter().copied()
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn add_thread(&mut self, tid: ThreadId) {
        self.threads.insert(tid);
    }

    pub(crate) fn remove_thread(&mut self, tid: ThreadId) -> bool {
        self.threads.remove(&tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

    fn space() -> AddressSpace {
        AddressSpace::new(PhysicalPage::containing_address(PhysicalAddress::new(0x5000)))
    }

    fn region(start: u64, length: u64) -> Region {
        Region::anonymous(VirtualAddress::new(start), length, RegionFlags::empty())
    }

    #[test]
    fn find_uses_ordered_neighbour() {
        let mut s = space();
        s.insert_region(region(0x1000, 0x1000)).unwrap();
        s.insert_region(region(0x8000, 0x2000)).unwrap();

        assert_eq!(s.find(VirtualAddress::new(0x8FFF)), Some(&region(0x8000, 0x2000)));
        assert_eq!(s.find(VirtualAddress::new(0x2000)), None);
        assert_eq!(s.find(VirtualAddress::new(0x0FFF)), None);
    }

    #[test]
    fn range_spanning_a_gap_still_overlaps_the_right_region() {
        let mut s = space();
        s.insert_region(region(0x1000, 0x1000)).unwrap();
        s.insert_region(region(0x8000, 0x1000)).unwrap();
        let wide = VirtualRange::new(VirtualAddress::new(0x3000), 0x6000);
        assert_eq!(s.overlapping(&wide), Some(&region(0x8000, 0x1000)));
    }

    #[test]
    fn slot_status_is_per_directory_slot() {
        let mut s = space();
        s.set_table_slot_status(VirtualAddress::new(0x40_1234), true);
        assert!(s.table_slot_status(VirtualAddress::new(0x7F_FFFF)));
        assert!(!s.table_slot_status(VirtualAddress::new(0x80_0000)));
    }
}
