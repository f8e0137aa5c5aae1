//! # Kernel Heap Boundary
//!
//! `morecore`-style management of the kernel heap end, plus reclamation of
//! frames that are still mapped past that end.

use crate::{FrameStack, HeapError, Reclaim};
use kernel_info::memory::MemoryLayout;
use kernel_memory_addresses::{PageSize, Size4K, Size4M, VirtualAddress};
use kernel_vmem::{Mmu, PAGE_SIZE, PageTableManager};
use log::{error, trace, warn};

/// The kernel heap: a page-granular range `[start, end)` inside `[start, limit)`.
#[derive(Debug, Clone)]
pub struct KernelHeap {
    start: VirtualAddress,
    limit: VirtualAddress,
    /// `None` until the heap is first extended.
    end: Option<VirtualAddress>,
}

impl KernelHeap {
    #[must_use]
    pub const fn new(start: VirtualAddress, limit: VirtualAddress) -> Self {
        Self {
            start,
            limit,
            end: None,
        }
    }

    #[must_use]
    pub const fn from_layout(layout: &MemoryLayout) -> Self {
        Self::new(layout.heap_start, layout.heap_limit)
    }

    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    #[must_use]
    pub const fn limit(&self) -> VirtualAddress {
        self.limit
    }

    #[must_use]
    pub const fn end(&self) -> Option<VirtualAddress> {
        self.end
    }

    /// Move the heap end by `amount` bytes and return the previous end.
    ///
    /// - `0` only queries the end.
    /// - The first non-zero call starts the heap at `start`.
    /// - The amount is rounded up to whole pages in either direction, so the
    ///   end stays page aligned.
    /// - Growth is clamped at `limit`, shrinking at `start`.
    ///
    /// Backing frames are mapped by the page-fault path, not here.
    ///
    /// # Errors
    /// [`HeapError::Uninitialized`] when querying before the first extension.
    pub fn morecore(&mut self, amount: isize) -> Result<VirtualAddress, HeapError> {
        if amount == 0 {
            return self.end.ok_or(HeapError::Uninitialized);
        }

        let prev = *self.end.get_or_insert(self.start);
        let magnitude = amount.unsigned_abs() as u64;
        let rounded = magnitude.checked_next_multiple_of(PAGE_SIZE as u64);

        let next = if amount > 0 {
            let grown = rounded
                .and_then(|rounded| prev.checked_add(rounded))
                .filter(|end| *end <= self.limit);
            grown.unwrap_or_else(|| {
                warn!("Kernel heap growth by {magnitude} bytes clamped at {}", self.limit);
                self.limit
            })
        } else {
            rounded
                .and_then(|rounded| prev.as_u64().checked_sub(rounded))
                .map(VirtualAddress::new)
                .filter(|end| *end >= self.start)
                .unwrap_or_else(|| {
                    warn!("Kernel heap shrink by {magnitude} bytes clamped at {}", self.start);
                    self.start
                })
        };

        trace!("Kernel heap end {prev} -> {next}");
        self.end = Some(next);
        Ok(prev)
    }

    /// Unmap every page still mapped between the heap end and the limit in
    /// the active space and push its frame onto `frames`.
    ///
    /// A 4 MiB region whose page table is absent (or which is a large page)
    /// is skipped in one step. Stops early once `frames` is full. Returns the
    /// number of frames reclaimed.
    pub fn reclaim_tail<M: Mmu>(
        &self,
        pager: &mut PageTableManager<M>,
        frames: &mut FrameStack,
    ) -> usize {
        let from = self.end.unwrap_or(self.start);
        let Some(mut addr) = from.checked_align_up::<Size4K>() else {
            return 0;
        };
        let root = pager.current_root();
        let mut reclaimed = 0;

        while addr < self.limit && !frames.is_full() {
            if pager.read_directory_entry(root, addr).frame().is_none() {
                match addr.align_down::<Size4M>().checked_add(Size4M::SIZE) {
                    Some(next) => addr = next,
                    None => break,
                }
                continue;
            }

            if pager.read_table_entry(root, addr).is_ok_and(|pte| pte.present()) {
                match pager.unmap_page(addr, root) {
                    Ok(phys) => match frames.free(phys) {
                        Ok(()) => reclaimed += 1,
                        Err(e) => error!("Lost frame {phys} while reclaiming {addr}: {e}"),
                    },
                    Err(e) => error!("Failed to unmap stale heap page {addr}: {e}"),
                }
            }

            addr += PAGE_SIZE as u64;
        }

        if reclaimed > 0 {
            warn!("Reclaimed {reclaimed} frames past the kernel heap end");
        }
        reclaimed
    }
}

/// [`Reclaim`] strategy that scans the kernel heap tail.
pub struct HeapTailReclaimer<'a, M: Mmu> {
    heap: &'a KernelHeap,
    pager: &'a mut PageTableManager<M>,
}

impl<'a, M: Mmu> HeapTailReclaimer<'a, M> {
    pub const fn new(heap: &'a KernelHeap, pager: &'a mut PageTableManager<M>) -> Self {
        Self { heap, pager }
    }
}

impl<M: Mmu> Reclaim for HeapTailReclaimer<'_, M> {
    fn reclaim(&mut self, frames: &mut FrameStack) -> usize {
        self.heap.reclaim_tail(self.pager, frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> KernelHeap {
        KernelHeap::new(VirtualAddress::new(0xD000_0000), VirtualAddress::new(0xD001_0000))
    }

    #[test]
    fn query_before_init_fails() {
        let mut h = heap();
        assert_eq!(h.morecore(0), Err(HeapError::Uninitialized));
    }

    #[test]
    fn growth_rounds_to_pages_and_returns_previous_end() {
        let mut h = heap();
        assert_eq!(h.morecore(10), Ok(VirtualAddress::new(0xD000_0000)));
        assert_eq!(h.morecore(0), Ok(VirtualAddress::new(0xD000_1000)));
        assert_eq!(h.morecore(4096), Ok(VirtualAddress::new(0xD000_1000)));
        assert_eq!(h.end(), Some(VirtualAddress::new(0xD000_2000)));
    }

    #[test]
    fn growth_clamps_at_limit() {
        let mut h = heap();
        h.morecore(0x8000).unwrap();
        assert_eq!(h.morecore(isize::MAX), Ok(VirtualAddress::new(0xD000_8000)));
        assert_eq!(h.morecore(0), Ok(VirtualAddress::new(0xD001_0000)));
    }

    #[test]
    fn shrink_clamps_at_start() {
        let mut h = heap();
        h.morecore(0x3000).unwrap();
        assert_eq!(h.morecore(-0x1000), Ok(VirtualAddress::new(0xD000_3000)));
        assert_eq!(h.morecore(-0x10_0000), Ok(VirtualAddress::new(0xD000_2000)));
        assert_eq!(h.morecore(0), Ok(VirtualAddress::new(0xD000_0000)));
    }

    #[test]
    fn partial_page_shrink_keeps_the_end_aligned() {
        let mut h = heap();
        h.morecore(0x3000).unwrap();
        assert_eq!(h.morecore(-0x800), Ok(VirtualAddress::new(0xD000_3000)));
        assert_eq!(h.end(), Some(VirtualAddress::new(0xD000_2000)));
        assert_eq!(h.morecore(-1), Ok(VirtualAddress::new(0xD000_2000)));
        assert!(h.end().is_some_and(|end| end.is_aligned::<Size4K>()));
        assert_eq!(h.morecore(0), Ok(VirtualAddress::new(0xD000_1000)));
    }

    #[test]
    fn first_call_may_shrink() {
        let mut h = heap();
        assert_eq!(h.morecore(-1), Ok(VirtualAddress::new(0xD000_0000)));
        assert_eq!(h.end(), Some(h.start()));
    }
}
