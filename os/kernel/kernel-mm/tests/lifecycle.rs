mod common;

use common::{FRAMES, MODULE, booted, frame, frame_storage, layout, manager, va};
use kernel_aspace::{Backing, RegionFlags, RegistryError};
use kernel_info::boot::{BootInfo, MemoryArea, MemoryAreaKind};
use kernel_info::thread::ThreadId;
use kernel_memory_addresses::PhysicalAddress;
use kernel_mm::{FileImage, MemoryManager, MmError, SegmentMapping, SharedMemoryManager};
use kernel_sync::SpinLock;
use kernel_vmem::sim::SimulatedMmu;
use kernel_vmem::{MapFlags, VmemError};

fn text_segment() -> SegmentMapping {
    SegmentMapping {
        vaddr: va(0x40_0000),
        mem_size: 0x2800,
        file: Some(FileImage {
            phys: frame(MODULE.start).base(),
            size: 0x1800,
        }),
        flags: RegionFlags::READ_ONLY,
    }
}

#[test]
fn init_registers_pager_space_and_seeds_frames() {
    let mut mm = booted();
    let root = mm.pager().current_root();

    // 16..64 minus the four module frames.
    assert_eq!(mm.frames().len(), FRAMES - 16 - MODULE.len());
    assert!(mm.registry().lookup(root).is_some());
    assert_eq!(mm.registry().resolve_thread(ThreadId::BOOTSTRAP), Some(root));

    let boot = BootInfo {
        name: "again",
        memory_areas: &[],
        modules: &[],
        root_table: PhysicalAddress::zero(),
    };
    assert_eq!(
        mm.init(&boot),
        Err(MmError::Registry(RegistryError::Duplicate(root)))
    );
}

#[test]
fn init_records_existing_heap_tables() {
    let mm = manager(0..FRAMES, |pager| {
        let root = pager.current_root();
        pager
            .map_page_table(va(0xD040_0000), frame(1), MapFlags::KERNEL_RW, root)
            .unwrap();
    });
    let root = mm.pager().current_root();
    assert_eq!(mm.registry().table_slot_status(root, va(0xD040_0000)), Ok(true));
    assert_eq!(mm.registry().table_slot_status(root, va(0xD000_0000)), Ok(false));
}

#[test]
fn init_rejects_inactive_root() {
    let mut mm = MemoryManager::new(SimulatedMmu::new(FRAMES), layout(), frame_storage());
    let areas = [MemoryArea {
        base: PhysicalAddress::zero(),
        length: 0x4_0000,
        kind: MemoryAreaKind::Available,
    }];
    let boot = BootInfo {
        name: "init",
        memory_areas: &areas,
        modules: &[],
        root_table: frame(5).base(),
    };
    assert!(matches!(mm.init(&boot), Err(MmError::InvalidArgument(_))));
    assert!(mm.frames().is_empty());
}

#[test]
fn new_space_shares_kernel_half_and_maps_itself() {
    let mut mm = manager(0..FRAMES, |pager| {
        let root = pager.current_root();
        pager
            .map_page_table(va(0xC000_0000), frame(2), MapFlags::KERNEL_RW, root)
            .unwrap();
    });
    let current = mm.pager().current_root();
    let space = mm.create_address_space().unwrap();
    assert_ne!(space, current);
    assert!(mm.registry().lookup(space).is_some());

    let pager = mm.pager_mut();
    assert_eq!(
        pager.read_directory_entry(space, va(0xC000_0000)),
        pager.read_directory_entry(current, va(0xC000_0000))
    );
    assert_eq!(pager.read_directory_entry(space, va(0xFFC0_0000)).frame(), Some(space));
    assert!(!pager.read_directory_entry(space, va(0x40_0000)).present());
    assert!(!pager.mmu().temp_in_use());
}

#[test]
fn segment_maps_file_pages_and_zero_fills_the_rest() {
    let mut mm = booted();
    let space = mm.create_address_space().unwrap();
    mm.pager_mut().poke(frame(MODULE.start).base(), b"code");
    mm.pager_mut().poke(frame(MODULE.start + 1).base(), b"data");

    assert_eq!(mm.map_segment(space, &text_segment()), Ok(3));

    let mut buf = [0u8; 4];
    mm.peek_virt(space, va(0x40_0000), &mut buf).unwrap();
    assert_eq!(&buf, b"code");
    mm.peek_virt(space, va(0x40_1000), &mut buf).unwrap();
    assert_eq!(&buf, b"data");

    let mut tail = [0xFFu8; 16];
    mm.peek_virt(space, va(0x40_2000), &mut tail).unwrap();
    assert_eq!(tail, [0; 16]);

    let pager = mm.pager_mut();
    assert!(pager.is_readable(va(0x40_2FFF), space));
    assert!(!pager.is_writable(va(0x40_0000), space));
    assert_eq!(
        mm.poke_virt(space, va(0x40_0000), b"x"),
        Err(MmError::Vmem(VmemError::Fault(va(0x40_0000))))
    );

    assert_eq!(mm.registry().table_slot_status(space, va(0x40_0000)), Ok(true));
    let region = mm.registry().find_address(space, va(0x40_2FFF)).unwrap();
    assert_eq!(region.flags, RegionFlags::READ_ONLY);
    assert!(matches!(region.backing, Backing::Physical { length: 0x1800, .. }));
}

#[test]
fn overlapping_segment_is_rejected_before_mapping() {
    let mut mm = booted();
    let space = mm.create_address_space().unwrap();
    mm.map_segment(space, &text_segment()).unwrap();
    let free_before = mm.frames().len();

    let bss = SegmentMapping {
        vaddr: va(0x40_2000),
        mem_size: 0x3000,
        file: None,
        flags: RegionFlags::empty(),
    };
    assert_eq!(
        mm.map_segment(space, &bss),
        Err(MmError::Registry(RegistryError::Overlap(va(0x40_0000))))
    );
    assert_eq!(mm.frames().len(), free_before);
    assert!(mm.pager_mut().is_readable(va(0x40_2000), space));
    assert!(!mm.pager_mut().is_readable(va(0x40_3000), space));
}

#[test]
fn malformed_segments_are_invalid() {
    let mut mm = booted();
    let space = mm.create_address_space().unwrap();
    let cases = [
        SegmentMapping { vaddr: va(0x40_0010), ..text_segment() },
        SegmentMapping { mem_size: 0, file: None, ..text_segment() },
        SegmentMapping { mem_size: 0x1000, ..text_segment() },
        SegmentMapping { vaddr: va(0xBFFF_F000), ..text_segment() },
    ];
    for segment in cases {
        assert!(
            matches!(mm.map_segment(space, &segment), Err(MmError::InvalidArgument(_))),
            "{segment:?}"
        );
    }
    assert_eq!(mm.registry().lookup(space).unwrap().region_count(), 0);
}

#[test]
fn exhaustion_midway_unwinds_the_segment() {
    // Two frames: one for the directory, one for the page table.
    let mut mm = manager(16..18, |_| {});
    let space = mm.create_address_space().unwrap();
    let bss = SegmentMapping {
        vaddr: va(0x40_0000),
        mem_size: 0x2000,
        file: None,
        flags: RegionFlags::empty(),
    };

    assert_eq!(mm.map_segment(space, &bss), Err(MmError::OutOfMemory));
    assert!(mm.registry().find_address(space, va(0x40_0000)).is_none());
    assert!(!mm.pager_mut().is_readable(va(0x40_0000), space));
    assert!(mm.frames().is_empty());
}

#[test]
fn destroying_a_space_returns_every_frame_it_took() {
    let mut mm = booted();
    let free_before = mm.frames().len();
    let space = mm.create_address_space().unwrap();
    mm.map_segment(space, &text_segment()).unwrap();
    mm.attach_thread(space, ThreadId::new(7)).unwrap();
    // Directory, page table and the zero-filled tail page.
    assert_eq!(mm.frames().len(), free_before - 3);

    assert_eq!(mm.release_thread(ThreadId::new(7)), Ok(Some(space)));
    assert_eq!(mm.frames().len(), free_before);
    assert!(mm.registry().lookup(space).is_none());
    assert_eq!(mm.registry().resolve_thread(ThreadId::new(7)), None);
}

#[test]
fn repeated_bss_spaces_do_not_leak_frames() {
    let mut mm = booted();
    let free_before = mm.frames().len();
    let bss = SegmentMapping {
        vaddr: va(0x40_0000),
        mem_size: 0x3000,
        file: None,
        flags: RegionFlags::empty(),
    };

    for _ in 0..FRAMES {
        let space = mm.create_address_space().unwrap();
        assert_eq!(mm.map_segment(space, &bss), Ok(3));
        mm.attach_thread(space, ThreadId::new(9)).unwrap();
        assert_eq!(mm.release_thread(ThreadId::new(9)), Ok(Some(space)));
        assert_eq!(mm.frames().len(), free_before);
    }
}

#[test]
fn image_frames_stay_with_the_image_after_teardown() {
    let mut mm = booted();
    let space = mm.create_address_space().unwrap();
    mm.map_segment(space, &text_segment()).unwrap();
    assert_eq!(mm.destroy_address_space(space), Ok(3));

    let mut freed = Vec::new();
    while let Ok(page) = mm.alloc_frame() {
        freed.push(page);
    }
    assert_eq!(freed.len(), FRAMES - 16 - MODULE.len());
    assert!(!freed.contains(&frame(MODULE.start)));
    assert!(!freed.contains(&frame(MODULE.start + 1)));
}

#[test]
fn space_survives_while_threads_remain() {
    let mut mm = booted();
    let space = mm.create_address_space().unwrap();
    mm.attach_thread(space, ThreadId::new(7)).unwrap();
    mm.attach_thread(space, ThreadId::new(8)).unwrap();
    assert_eq!(
        mm.attach_thread(mm.pager().current_root(), ThreadId::new(8)),
        Err(MmError::Registry(RegistryError::AlreadyBound {
            tid: ThreadId::new(8),
            space
        }))
    );

    assert_eq!(mm.release_thread(ThreadId::new(7)), Ok(None));
    assert!(mm.registry().lookup(space).is_some());
}

#[test]
fn active_space_is_never_destroyed() {
    let mut mm = booted();
    let root = mm.pager().current_root();
    assert_eq!(mm.release_thread(ThreadId::BOOTSTRAP), Ok(None));
    assert!(mm.registry().lookup(root).is_some());
    assert_eq!(mm.destroy_address_space(root), Err(MmError::ActiveSpace(root)));
}

#[test]
fn exhausted_stack_reclaims_stale_heap_pages() {
    let mut mm = manager(16..17, |pager| {
        let root = pager.current_root();
        pager
            .map_page_table(va(0xD000_0000), frame(3), MapFlags::KERNEL_RW, root)
            .unwrap();
        pager
            .map_page(va(0xD000_0000), frame(5).base(), MapFlags::KERNEL_RW, root)
            .unwrap();
    });

    assert_eq!(mm.alloc_frame(), Ok(frame(16)));
    assert_eq!(mm.alloc_frame(), Ok(frame(5)));
    assert_eq!(mm.alloc_frame(), Err(MmError::OutOfMemory));

    let root = mm.pager().current_root();
    assert!(!mm.pager_mut().is_readable(va(0xD000_0000), root));
}

#[test]
fn heap_in_use_is_not_reclaimed() {
    let mut mm = manager(16..17, |pager| {
        let root = pager.current_root();
        pager
            .map_page_table(va(0xD000_0000), frame(3), MapFlags::KERNEL_RW, root)
            .unwrap();
        pager
            .map_page(va(0xD000_0000), frame(5).base(), MapFlags::KERNEL_RW, root)
            .unwrap();
    });
    assert_eq!(mm.morecore(100), Ok(va(0xD000_0000)));
    assert_eq!(mm.morecore(0), Ok(va(0xD000_1000)));

    mm.alloc_frame().unwrap();
    assert_eq!(mm.alloc_frame(), Err(MmError::OutOfMemory));
    mm.free_frame(frame(16).base()).unwrap();
    assert_eq!(mm.alloc_frame(), Ok(frame(16)));
}

#[test]
fn shared_manager_is_used_under_the_irq_lock() {
    let shared: SharedMemoryManager<SimulatedMmu> = SpinLock::new(booted());
    let space = shared.lock_irq().create_address_space().unwrap();

    let mut mm = shared.lock_irq();
    mm.map_segment(
        space,
        &SegmentMapping {
            vaddr: va(0x1000),
            mem_size: 0x1000,
            file: None,
            flags: RegionFlags::empty(),
        },
    )
    .unwrap();
    mm.poke_virt(space, va(0x1FFE), b"ok").unwrap();
    let mut buf = [0u8; 2];
    mm.peek_virt(space, va(0x1FFE), &mut buf).unwrap();
    assert_eq!(&buf, b"ok");
}
