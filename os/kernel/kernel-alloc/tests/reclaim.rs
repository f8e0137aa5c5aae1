use kernel_alloc::{FrameAllocError, FrameStack, HeapTailReclaimer, KernelHeap, NoReclaim};
use kernel_memory_addresses::{PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::sim::SimulatedMmu;
use kernel_vmem::{MapFlags, PageTableManager, VmemError};

const HEAP_START: u64 = 0x40_0000;
const HEAP_LIMIT: u64 = 0xC0_0000;

fn storage(capacity: usize) -> &'static mut [PhysicalPage<Size4K>] {
    vec![SimulatedMmu::frame_page(0); capacity].leak()
}

/// Heap of two pages in use, with five pages (frames 10..=14) still mapped.
fn setup() -> (PageTableManager<SimulatedMmu>, KernelHeap) {
    let mut pager = PageTableManager::new(SimulatedMmu::new(32));
    let root = pager.current_root();
    pager
        .map_page_table(VirtualAddress::new(HEAP_START), SimulatedMmu::frame_page(1), MapFlags::KERNEL_RW, root)
        .unwrap();
    for (i, frame) in (10..15).enumerate() {
        pager
            .map_page(
                VirtualAddress::new(HEAP_START + i as u64 * 4096),
                SimulatedMmu::frame_page(frame).base(),
                MapFlags::KERNEL_RW,
                root,
            )
            .unwrap();
    }

    let mut heap = KernelHeap::new(VirtualAddress::new(HEAP_START), VirtualAddress::new(HEAP_LIMIT));
    heap.morecore(2 * 4096).unwrap();
    (pager, heap)
}

#[test]
fn exhausted_stack_reclaims_pages_past_heap_end() {
    let (mut pager, heap) = setup();
    let mut frames = FrameStack::new(storage(8));
    frames.seed((20..24).map(SimulatedMmu::frame_page));

    for _ in 0..4 {
        frames.allocate(&mut NoReclaim).unwrap();
    }

    let mut reclaimed = Vec::new();
    for _ in 0..3 {
        let mut reclaimer = HeapTailReclaimer::new(&heap, &mut pager);
        reclaimed.push(frames.allocate(&mut reclaimer).unwrap());
    }
    assert_eq!(
        reclaimed,
        [14, 13, 12].map(SimulatedMmu::frame_page).to_vec()
    );

    let mut reclaimer = HeapTailReclaimer::new(&heap, &mut pager);
    assert_eq!(frames.allocate(&mut reclaimer), Err(FrameAllocError::OutOfMemory));
}

#[test]
fn reclaimed_pages_are_unmapped_and_flushed() {
    let (mut pager, heap) = setup();
    let root = pager.current_root();
    pager.mmu_mut().clear_invalidations();

    let mut frames = FrameStack::new(storage(8));
    assert_eq!(heap.reclaim_tail(&mut pager, &mut frames), 3);
    assert_eq!(frames.len(), 3);

    let below_end = VirtualAddress::new(HEAP_START + 0x1000);
    let past_end = VirtualAddress::new(HEAP_START + 0x2000);
    assert!(pager.translate(below_end, root).is_ok());
    assert_eq!(pager.translate(past_end, root), Err(VmemError::NotMapped(past_end)));
    assert_eq!(pager.mmu().invalidations().len(), 3);
}

#[test]
fn reclamation_stops_when_stack_is_full() {
    let (mut pager, heap) = setup();
    let root = pager.current_root();
    let mut frames = FrameStack::new(storage(2));

    assert_eq!(heap.reclaim_tail(&mut pager, &mut frames), 2);
    assert!(frames.is_full());
    assert!(pager.translate(VirtualAddress::new(HEAP_START + 0x4000), root).is_ok());
}

#[test]
fn uninitialized_heap_scans_from_start() {
    let (mut pager, _) = setup();
    let heap = KernelHeap::new(VirtualAddress::new(HEAP_START), VirtualAddress::new(HEAP_LIMIT));
    let mut frames = FrameStack::new(storage(16));
    assert_eq!(heap.reclaim_tail(&mut pager, &mut frames), 5);
}
