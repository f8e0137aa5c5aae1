//! # Memory Manager
//!
//! The process-wide memory context. It owns the page-table manager, the free
//! frame stack, the kernel heap boundary and the address space registry, and
//! is the only place where these are combined: creating and destroying
//! address spaces, mapping program segments, and reacting to thread signals.
//!
//! All state is reached through `&mut self`. The kernel wraps the manager in a
//! [`SharedMemoryManager`] and calls into it under
//! [`lock_irq`](kernel_sync::SpinLock::lock_irq), so no method ever runs
//! re-entrantly or with the temporary window already in use.

use crate::{MmError, PageFaultRequest, SegmentMapping, Signal, SignalKind, SignalOutcome, usable_frames};
use alloc::vec::Vec;
use kernel_alloc::{FrameStack, HeapTailReclaimer, KernelHeap};
use kernel_aspace::{AddressSpace, AddressSpaceRegistry, Backing, Region, RegionFlags, RegistryError, VirtualRange};
use kernel_info::boot::BootInfo;
use kernel_info::memory::MemoryLayout;
use kernel_info::thread::ThreadId;
use kernel_memory_addresses::{PageSize, PhysicalAddress, PhysicalPage, Size4K, Size4M, VirtualAddress};
use kernel_sched::{SchedError, Scheduler};
use kernel_sync::SpinLock;
use kernel_vmem::{DirectoryIndex, MapFlags, Mmu, PageEntry, PageTableManager, RootPage};
use log::{debug, error, info, warn};

/// The memory manager behind the interrupt-safe lock the kernel shares it with.
pub type SharedMemoryManager<M> = SpinLock<MemoryManager<M>>;

pub struct MemoryManager<M: Mmu> {
    pager: PageTableManager<M>,
    frames: FrameStack,
    heap: KernelHeap,
    registry: AddressSpaceRegistry,
    layout: MemoryLayout,
}

impl<M: Mmu> MemoryManager<M> {
    /// An uninitialized manager; call [`init`](Self::init) before anything else.
    ///
    /// `frame_storage` holds the free frame stack. It must be mapped before
    /// the heap exists; at most `layout.frame_stack_capacity` slots are used.
    #[must_use]
    pub fn new(mmu: M, layout: MemoryLayout, frame_storage: &'static mut [PhysicalPage<Size4K>]) -> Self {
        debug_assert!(layout.is_consistent());
        let capacity = frame_storage.len().min(layout.frame_stack_capacity);
        if capacity < layout.frame_stack_capacity {
            warn!(
                "Frame stack storage holds {capacity} of {} frames",
                layout.frame_stack_capacity
            );
        }
        let (frame_storage, _) = frame_storage.split_at_mut(capacity);
        Self {
            pager: PageTableManager::new(mmu),
            frames: FrameStack::new(frame_storage),
            heap: KernelHeap::from_layout(&layout),
            registry: AddressSpaceRegistry::new(),
            layout,
        }
    }

    #[inline]
    #[must_use]
    pub const fn pager(&self) -> &PageTableManager<M> {
        &self.pager
    }

    #[inline]
    pub const fn pager_mut(&mut self) -> &mut PageTableManager<M> {
        &mut self.pager
    }

    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &AddressSpaceRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &FrameStack {
        &self.frames
    }

    #[inline]
    #[must_use]
    pub const fn heap(&self) -> &KernelHeap {
        &self.heap
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Take over from the loader.
    ///
    /// Registers the active (pager) address space, records the page tables
    /// already backing the kernel heap, binds the bootstrap thread and seeds
    /// the frame stack from the boot memory map. Returns the number of frames
    /// seeded.
    ///
    /// # Errors
    /// - [`MmError::InvalidArgument`] if the boot page directory is unaligned
    ///   or not the active one.
    /// - [`RegistryError::Duplicate`] if called twice.
    pub fn init(&mut self, boot: &BootInfo<'_>) -> Result<usize, MmError> {
        let root = PhysicalPage::<Size4K>::try_from(boot.root_table)
            .map_err(|_| MmError::InvalidArgument("boot page directory is not page aligned"))?;
        if root != self.pager.current_root() {
            return Err(MmError::InvalidArgument("boot page directory is not the active one"));
        }

        let mut pager_space = AddressSpace::new(root);
        for slot in table_slots(self.layout.heap_start, self.layout.heap_limit) {
            if self.pager.read_directory_entry(root, slot).frame().is_some() {
                pager_space.set_table_slot_status(slot, true);
            }
        }
        let populated = pager_space.table_bitmap().count();

        self.registry.add_address_space(pager_space)?;
        self.registry.bind_thread(root, ThreadId::BOOTSTRAP)?;

        let seeded = self.frames.seed(usable_frames(boot, &self.layout));
        info!(
            "Memory manager for {:?} ready: {seeded} free frames, pager space {root} with {populated} heap tables",
            boot.name
        );
        if seeded == 0 {
            warn!("Boot memory map yielded no usable frames");
        }
        Ok(seeded)
    }

    /// Pop a free frame, reclaiming stale heap pages if the stack is empty.
    ///
    /// # Errors
    /// [`MmError::OutOfMemory`] if nothing is left after reclamation.
    pub fn alloc_frame(&mut self) -> Result<PhysicalPage<Size4K>, MmError> {
        let mut reclaim = HeapTailReclaimer::new(&self.heap, &mut self.pager);
        Ok(self.frames.allocate(&mut reclaim)?)
    }

    /// Return `frame` to the free stack.
    ///
    /// # Errors
    /// [`MmError::Frame`] if `frame` is unaligned or the stack is full.
    pub fn free_frame(&mut self, frame: PhysicalAddress) -> Result<(), MmError> {
        Ok(self.frames.free(frame)?)
    }

    fn alloc_zeroed_frame(&mut self) -> Result<PhysicalPage<Size4K>, MmError> {
        let frame = self.alloc_frame()?;
        self.pager.zero_frame(frame);
        Ok(frame)
    }

    /// Free `frame`, logging instead of failing. Returns whether it was pushed.
    fn release_frame(&mut self, frame: PhysicalPage<Size4K>) -> bool {
        match self.frames.free(frame.base()) {
            Ok(()) => true,
            Err(e) => {
                error!("Leaking frame {frame}: {e}");
                false
            }
        }
    }

    /// Build a new address space: a zeroed page directory sharing the kernel
    /// half of the active one and mapping itself through the recursive slot.
    ///
    /// # Errors
    /// [`MmError::OutOfMemory`] if no frame is available for the directory.
    pub fn create_address_space(&mut self) -> Result<RootPage, MmError> {
        let root = self.alloc_zeroed_frame()?;
        if let Err(e) = self.registry.create(root) {
            self.release_frame(root);
            return Err(e.into());
        }

        let current = self.pager.current_root();
        let kernel_start = self.layout.kernel_space_start;
                let mut shared = 0;
        for slot in DirectoryIndex::all().filter(|s| s.base() >= kernel_start) {
            let entry = if slot == DirectoryIndex::RECURSIVE {
                PageEntry::table(root, MapFlags::KERNEL_RW)
            } else {
                self.pager.read_directory_entry(current, slot.base())
            };
            if entry.present() {
                self.pager.write_directory_entry(root, slot.base(), entry);
                shared += 1;
            }
        }

        info!("Created address space {root} ({shared} kernel directory entries)");
        Ok(root)
    }

    /// Make sure a page table covers `virt` in `space`, installing a zeroed
    /// one if neither the population bitmap nor the directory has one.
    /// Returns whether a table was installed.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownSpace`] if `space` is not registered.
    /// - [`MmError::OutOfMemory`] if no frame is left for the table.
    pub fn ensure_page_table(&mut self, space: RootPage, virt: VirtualAddress) -> Result<bool, MmError> {
        if self.registry.table_slot_status(space, virt)? {
            return Ok(false);
        }
        if self.pager.read_directory_entry(space, virt).present() {
            return Ok(false);
        }

        let table = self.alloc_zeroed_frame()?;
        let flags = if virt < self.layout.kernel_space_start {
            MapFlags::USER_RW
        } else {
            MapFlags::KERNEL_RW
        };
        if let Err(e) = self.pager.map_page_table(virt, table, flags, space) {
            self.release_frame(table);
            return Err(e.into());
        }
        self.registry.set_table_slot_status(space, virt, true)?;
        debug!("Installed page table {table} for {virt} in {space}");
        Ok(true)
    }

    /// Map one loadable program segment into `space`.
    ///
    /// The segment is first recorded as a region, so an overlap is rejected
    /// before anything is mapped. Each page is then mapped to the file image
    /// when it has one and to a fresh zeroed frame otherwise. Read-only
    /// segments are mapped without write access. On failure every page mapped
    /// so far is unmapped again and the region is dropped. Returns the number
    /// of pages mapped.
    ///
    /// # Errors
    /// - [`MmError::InvalidArgument`] for an unaligned, empty or out-of-range
    ///   segment.
    /// - [`RegistryError::Overlap`] if the segment intersects a region.
    /// - [`MmError::OutOfMemory`] if frames run out midway.
    pub fn map_segment(&mut self, space: RootPage, segment: &SegmentMapping) -> Result<usize, MmError> {
        let length = self.validate_segment(segment)?;
        let (backing, region_flags) = match segment.file {
            Some(file) => (
                Backing::Physical {
                    start: file.phys,
                    length: file.size,
                },
                segment.flags,
            ),
            None => (Backing::None, segment.flags | RegionFlags::ZERO_ON_MAP),
        };
        let region = Region::new(VirtualRange::new(segment.vaddr, length), backing, region_flags);
        self.registry.attach_region(space, region)?;

        let map_flags = if segment.flags.contains(RegionFlags::READ_ONLY) {
            MapFlags::USER_RO
        } else {
            MapFlags::USER_RW
        };

        let mut mapped = Vec::new();
        for index in 0..segment.page_count() {
            let virt = segment.vaddr + index * Size4K::SIZE;
            match self.map_segment_page(space, virt, segment.file_page(index), map_flags) {
                Ok(owned) => mapped.push((virt, owned)),
                Err(e) => {
                    error!("Mapping segment at {} failed at {virt}: {e}", segment.vaddr);
                    self.unwind_segment(space, segment.vaddr, &mapped);
                    return Err(e);
                }
            }
        }

        debug!("Mapped segment {}+{length:#x} into {space}", segment.vaddr);
        Ok(mapped.len())
    }

    /// Returns the segment length rounded up to whole pages.
    fn validate_segment(&self, segment: &SegmentMapping) -> Result<u64, MmError> {
        if !segment.vaddr.is_aligned::<Size4K>() {
            return Err(MmError::InvalidArgument("segment start is not page aligned"));
        }
        if segment.mem_size == 0 {
            return Err(MmError::InvalidArgument("empty segment"));
        }
        if let Some(file) = segment.file {
            if !file.phys.is_aligned::<Size4K>() {
                return Err(MmError::InvalidArgument("segment image is not page aligned"));
            }
            if file.size > segment.mem_size {
                return Err(MmError::InvalidArgument("segment image exceeds its memory size"));
            }
        }
        let length = segment.page_count() * Size4K::SIZE;
        match segment.vaddr.checked_add(length) {
            Some(end) if end <= self.layout.kernel_space_start => Ok(length),
            _ => Err(MmError::InvalidArgument("segment reaches into kernel space")),
        }
    }

    /// Map one page of a segment. Returns whether its frame was allocated
    /// here rather than borrowed from the file image.
    fn map_segment_page(
        &mut self,
        space: RootPage,
        virt: VirtualAddress,
        file: Option<PhysicalAddress>,
        flags: MapFlags,
    ) -> Result<bool, MmError> {
        self.ensure_page_table(space, virt)?;
        let (phys, owned) = match file {
            Some(phys) => (phys, false),
            None => (self.alloc_zeroed_frame()?.base(), true),
        };
        if let Err(e) = self.pager.map_page(virt, phys, flags, space) {
            if owned {
                self.release_frame(PhysicalPage::containing_address(phys));
            }
            return Err(e.into());
        }
        Ok(owned)
    }

    fn unwind_segment(&mut self, space: RootPage, start: VirtualAddress, mapped: &[(VirtualAddress, bool)]) {
        for &(virt, owned) in mapped.iter().rev() {
            match self.pager.unmap_page(virt, space) {
                Ok(phys) if owned => {
                    self.release_frame(PhysicalPage::containing_address(phys));
                }
                Ok(_) => {}
                Err(e) => error!("Could not unwind mapping of {virt} in {space}: {e}"),
            }
        }
        if let Some(record) = self.registry.lookup_mut(space) {
            record.remove_region(start);
        }
    }

    /// Bind `tid` to `space`.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyBound`] or [`RegistryError::UnknownSpace`].
    pub fn attach_thread(&mut self, space: RootPage, tid: ThreadId) -> Result<(), MmError> {
        Ok(self.registry.bind_thread(space, tid)?)
    }

    /// Unbind `tid`. When it was the last thread of an inactive space, the
    /// space is destroyed and its root is returned.
    ///
    /// # Errors
    /// [`RegistryError::NotBound`] if `tid` has no binding.
    pub fn release_thread(&mut self, tid: ThreadId) -> Result<Option<RootPage>, MmError> {
        let unbound = self.registry.unbind_thread(tid)?;
        if unbound.remaining > 0 {
            return Ok(None);
        }
        if unbound.space == self.pager.current_root() {
            warn!("Last thread of the active space {} left; keeping it", unbound.space);
            return Ok(None);
        }
        self.destroy_address_space(unbound.space)?;
        Ok(Some(unbound.space))
    }

    /// Unregister `space` and free every frame it owns: the zero-filled pages
    /// of its regions, the page tables recorded in its population bitmap and
    /// the page directory. Pages mapped from a physical or file backing stay
    /// with that backing. Returns the number of frames freed.
    ///
    /// # Errors
    /// - [`MmError::ActiveSpace`] for the space loaded in CR3.
    /// - [`RegistryError::UnknownSpace`] if `space` is not registered.
    pub fn destroy_address_space(&mut self, space: RootPage) -> Result<usize, MmError> {
        if space == self.pager.current_root() {
            return Err(MmError::ActiveSpace(space));
        }
        let record = self
            .registry
            .remove(space)
            .ok_or(RegistryError::UnknownSpace(space))?;

        let mut freed = 0;
        for region in record.regions() {
            freed += self.release_owned_pages(space, region);
        }
        for slot in record.table_bitmap().iter() {
            match self.pager.read_directory_entry(space, slot.base()).frame() {
                Some(table) => freed += usize::from(self.release_frame(table)),
                None => warn!("Slot {slot:?} of {space} is marked populated but links no table"),
            }
        }
        freed += usize::from(self.release_frame(space));

        info!("Destroyed address space {space}, {freed} frames freed");
        Ok(freed)
    }

    /// Free the frames `map_segment` allocated for `region`: every page of an
    /// anonymous region, and the pages past the image of a physical one.
    fn release_owned_pages(&mut self, space: RootPage, region: &Region) -> usize {
        let first_owned = match region.backing {
            Backing::None => 0,
            Backing::Physical { length, .. } => length.div_ceil(Size4K::SIZE),
            Backing::File { .. } => return 0,
        };
        let pages = region.virt.length.div_ceil(Size4K::SIZE);

        let mut freed = 0;
        for index in first_owned..pages {
            let virt = region.virt.start + index * Size4K::SIZE;
            if virt >= self.layout.kernel_space_start {
                break;
            }
            // Pages never mapped, or in a slot without a table, own nothing.
            if let Ok(entry) = self.pager.read_table_entry(space, virt)
                && let Some(frame) = entry.frame()
            {
                freed += usize::from(self.release_frame(frame));
            }
        }
        freed
    }

    /// React to an IPC signal.
    ///
    /// Exceptions become a [`PageFaultRequest`] for the faulting thread's
    /// space. Exits remove the thread from `scheduler` (if it knows it) and
    /// release it, destroying its space with the last thread.
    ///
    /// # Errors
    /// [`RegistryError::NotBound`] if the thread has no address space. An
    /// exit of such a thread leaves `scheduler` untouched.
    pub fn dispatch_signal(
        &mut self,
        signal: Signal,
        scheduler: &mut Scheduler,
    ) -> Result<SignalOutcome, MmError> {
        let tid = signal.tid;
        match signal.kind {
            SignalKind::Exception => {
                let space = self
                    .registry
                    .resolve_thread(tid)
                    .ok_or(RegistryError::NotBound(tid))?;
                let address = VirtualAddress::from(signal.arg);
                debug!("Thread {tid} faulted at {address} in {space}");
                Ok(SignalOutcome::PageFault(PageFaultRequest { tid, space, address }))
            }
            SignalKind::Exit => {
                if self.registry.resolve_thread(tid).is_none() {
                    return Err(RegistryError::NotBound(tid).into());
                }
                info!("Thread {tid} exited");
                match scheduler.unregister(tid) {
                    Ok(()) | Err(SchedError::UnknownThread(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                let destroyed = self.release_thread(tid)?;
                Ok(SignalOutcome::Released { tid, destroyed })
            }
            SignalKind::Other(kind) => {
                debug!("Ignoring signal kind {kind} for thread {tid}");
                Ok(SignalOutcome::Ignored)
            }
        }
    }

    /// Read from `address` in `space` into `buf`.
    ///
    /// # Errors
    /// [`VmemError::Fault`](kernel_vmem::VmemError::Fault) if a page is not
    /// readable; nothing is copied then.
    pub fn peek_virt(&mut self, space: RootPage, address: VirtualAddress, buf: &mut [u8]) -> Result<(), MmError> {
        Ok(self.pager.peek_virt(address, buf, space)?)
    }

    /// Write `buf` to `address` in `space`.
    ///
    /// # Errors
    /// [`VmemError::Fault`](kernel_vmem::VmemError::Fault) if a page is not
    /// writable; nothing is copied then.
    pub fn poke_virt(&mut self, space: RootPage, address: VirtualAddress, buf: &[u8]) -> Result<(), MmError> {
        Ok(self.pager.poke_virt(address, buf, space)?)
    }

    /// Move the kernel heap end; see [`KernelHeap::morecore`].
    ///
    /// # Errors
    /// [`HeapError::Uninitialized`](kernel_alloc::HeapError::Uninitialized)
    /// when querying an unused heap.
    pub fn morecore(&mut self, amount: isize) -> Result<VirtualAddress, MmError> {
        Ok(self.heap.morecore(amount)?)
    }
}

/// Base of every 4 MiB slot intersecting `[start, end)`.
fn table_slots(start: VirtualAddress, end: VirtualAddress) -> impl Iterator<Item = VirtualAddress> {
    let first = start.as_u64() >> Size4M::SHIFT;
    let last = if end > start {
        end.as_u64().div_ceil(Size4M::SIZE)
    } else {
        first
    };
    (first..last).map(|i| VirtualAddress::new(i << Size4M::SHIFT))
}
