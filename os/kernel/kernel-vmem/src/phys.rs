//! # Raw Physical Memory Access
//!
//! Arbitrary frames are reached through the single temporary mapping window,
//! one frame at a time. The window is released before every call returns, so
//! no caller ever observes it occupied.

use crate::page_map::PAGE_SIZE;
use crate::{EntryIndex, Mmu, PageEntry, PageTableManager};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

impl<M: Mmu> PageTableManager<M> {
    /// Run `f` with `frame` mapped in the temporary window.
    fn with_temp<R>(&mut self, frame: PhysicalPage<Size4K>, f: impl FnOnce(&mut [u8; 4096]) -> R) -> R {
        // SAFETY: the window is free on entry (every path below releases it)
        // and `f` cannot reach the MMU to map something else meanwhile.
        let result = unsafe {
            let mut window = self.mmu.map_temp(frame);
            f(window.as_mut())
        };
        // SAFETY: pairs with the `map_temp` above; the borrow handed to `f` has ended.
        unsafe { self.mmu.unmap_temp() };
        result
    }

    /// Walk `len` bytes from `phys` frame by frame as `(frame, offset, range)`.
    fn for_each_chunk(
        &mut self,
        phys: PhysicalAddress,
        len: usize,
        mut f: impl FnMut(&mut [u8; 4096], usize, core::ops::Range<usize>),
    ) {
        let mut done = 0;
        while done < len {
            let at = phys + done as u64;
            let (frame, offset) = at.split::<Size4K>();
            let offset = offset.as_usize();
            let chunk = (PAGE_SIZE - offset).min(len - done);
            let range = done..done + chunk;
            self.with_temp(frame, |bytes| f(bytes, offset, range));
            done += chunk;
        }
    }

    /// Copy physical memory starting at `phys` into `buf`.
    pub fn peek(&mut self, phys: PhysicalAddress, buf: &mut [u8]) {
        let len = buf.len();
        self.for_each_chunk(phys, len, |bytes, offset, range| {
            let n = range.len();
            buf[range].copy_from_slice(&bytes[offset..offset + n]);
        });
    }

    /// Copy `buf` into physical memory starting at `phys`.
    pub fn poke(&mut self, phys: PhysicalAddress, buf: &[u8]) {
        self.for_each_chunk(phys, buf.len(), |bytes, offset, range| {
            let n = range.len();
            bytes[offset..offset + n].copy_from_slice(&buf[range]);
        });
    }

    /// Fill `frame` with zeroes.
    pub fn zero_frame(&mut self, frame: PhysicalPage<Size4K>) {
        self.with_temp(frame, |bytes| bytes.fill(0));
    }

    /// Copy the whole of `src` into `dst`.
    ///
    /// The window holds one frame at a time, so the copy bounces through a
    /// stack buffer.
    pub fn copy_frame(&mut self, src: PhysicalPage<Size4K>, dst: PhysicalPage<Size4K>) {
        let mut buf = [0u8; PAGE_SIZE];
        self.with_temp(src, |bytes| buf.copy_from_slice(bytes));
        self.with_temp(dst, |bytes| bytes.copy_from_slice(&buf));
    }

    /// Level-agnostic entry read: entry `index` of the page map in `map`.
    pub fn read_map_entry(&mut self, map: PhysicalPage<Size4K>, index: impl Into<EntryIndex>) -> PageEntry {
        let mut raw = [0u8; 4];
        self.peek(map.base() + index.into().byte_offset(), &mut raw);
        PageEntry::from_bits(u32::from_le_bytes(raw))
    }

    /// Level-agnostic entry write: entry `index` of the page map in `map`.
    pub fn write_map_entry(&mut self, map: PhysicalPage<Size4K>, index: impl Into<EntryIndex>, entry: PageEntry) {
        self.poke(map.base() + index.into().byte_offset(), &entry.into_bits().to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::SimulatedMmu;
    use crate::{EntryIndex, MapFlags, PageEntry, PageTableManager};
    use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

    #[test]
    fn peek_and_poke_cross_frame_boundaries() {
        let mut mgr = PageTableManager::new(SimulatedMmu::new(8));
        let at = PhysicalAddress::new(2 * 4096 - 3);
        mgr.poke(at, b"abcdefgh");

        let mut back = [0u8; 8];
        mgr.peek(at, &mut back);
        assert_eq!(&back, b"abcdefgh");
        assert_eq!(&mgr.mmu().frame_bytes(1)[4093..], b"abc");
        assert_eq!(&mgr.mmu().frame_bytes(2)[..5], b"defgh");
        assert!(!mgr.mmu().temp_in_use());
    }

    #[test]
    fn zero_and_copy_frames() {
        let mut mgr = PageTableManager::new(SimulatedMmu::new(8));
        let a = PhysicalPage::containing_address(PhysicalAddress::new(0x3000));
        let b = PhysicalPage::containing_address(PhysicalAddress::new(0x4000));
        mgr.poke(a.base() + 100, &[0xAA; 16]);
        mgr.copy_frame(a, b);
        assert_eq!(mgr.mmu().frame_bytes(4)[100..116], [0xAA; 16]);
        mgr.zero_frame(b);
        assert!(mgr.mmu().frame_bytes(4).iter().all(|&x| x == 0));
    }

    #[test]
    fn map_entries_are_little_endian_words() {
        let mut mgr = PageTableManager::new(SimulatedMmu::new(8));
        let map = PhysicalPage::containing_address(PhysicalAddress::new(0x5000));
        let i = EntryIndex::new(1023).unwrap();
        let e = PageEntry::leaf(PhysicalAddress::new(0x0012_3000), MapFlags::KERNEL_RW);
        mgr.write_map_entry(map, i, e);
        assert_eq!(mgr.read_map_entry(map, i), e);
        assert_eq!(mgr.mmu().frame_bytes(5)[4092..], [0x03, 0x30, 0x12, 0x00]);
    }
}
