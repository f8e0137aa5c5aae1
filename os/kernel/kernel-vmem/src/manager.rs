//! # Page Table Manager
//!
//! Reads and writes directory and table entries of *any* address space, maps
//! and unmaps single pages and whole page tables, and keeps the TLB coherent
//! for the active space.
//!
//! ## Current vs. foreign spaces
//!
//! Every operation takes the [`RootPage`] of the target space and resolves it
//! to an [`Access`] first:
//!
//! - [`Access::Current`]: the space is loaded in CR3. Entries are read and
//!   written through the live structures the [`Mmu`] exposes and every
//!   mutation is followed by TLB maintenance.
//! - [`Access::Foreign`]: the space is not active. Its directory and tables
//!   are plain frames and are reached through
//!   [`read_map_entry`](PageTableManager::read_map_entry) /
//!   [`write_map_entry`](PageTableManager::write_map_entry). Nothing is
//!   invalidated; the TLB holds no translations for it.
//!
//! Callers never choose the path themselves.

use crate::{DirectoryIndex, MapFlags, Mmu, PageEntry, RootPage, TableIndex, VmemError};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, Size4M, VirtualAddress};
use log::{debug, error, trace};

/// How the entries of an address space are reached.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Access {
    /// The space is active; use the live tables.
    Current,
    /// The space is inactive; go through physical memory.
    Foreign(RootPage),
}

/// Page-table manager over an [`Mmu`] backend.
pub struct PageTableManager<M: Mmu> {
    pub(crate) mmu: M,
}

impl<M: Mmu> PageTableManager<M> {
    pub const fn new(mmu: M) -> Self {
        Self { mmu }
    }

    #[inline]
    pub const fn mmu(&self) -> &M {
        &self.mmu
    }

    #[inline]
    pub const fn mmu_mut(&mut self) -> &mut M {
        &mut self.mmu
    }

    /// Root of the active address space.
    #[inline]
    pub fn current_root(&self) -> RootPage {
        self.mmu.current_root()
    }

    /// Select the access path for `space`.
    #[inline]
    pub fn access(&self, space: RootPage) -> Access {
        if space == self.mmu.current_root() {
            Access::Current
        } else {
            Access::Foreign(space)
        }
    }

    /// Read the directory entry covering `virt` in `space`.
    pub fn read_directory_entry(&mut self, space: RootPage, virt: VirtualAddress) -> PageEntry {
        let index = DirectoryIndex::of(virt);
        match self.access(space) {
            Access::Current => self.mmu.active_directory().get(index),
            Access::Foreign(root) => self.read_map_entry(root, index),
        }
    }

    /// Overwrite the directory entry covering `virt` in `space`.
    ///
    /// Performs no TLB maintenance.
    pub fn write_directory_entry(&mut self, space: RootPage, virt: VirtualAddress, entry: PageEntry) {
        let index = DirectoryIndex::of(virt);
        match self.access(space) {
            Access::Current => self.mmu.active_directory().set(index, entry),
            Access::Foreign(root) => self.write_map_entry(root, index, entry),
        }
    }

    /// Read the table entry for `virt` in `space`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if no page table is linked for `virt` (the
    /// directory entry is absent or maps a large page).
    pub fn read_table_entry(
        &mut self,
        space: RootPage,
        virt: VirtualAddress,
    ) -> Result<PageEntry, VmemError> {
        let table = self.linked_table(space, virt)?;
        let index = TableIndex::of(virt);
        Ok(match self.access(space) {
            // SAFETY: `linked_table` checked that the slot links a page table.
            Access::Current => unsafe { self.mmu.active_table(DirectoryIndex::of(virt)) }.get(index),
            Access::Foreign(_) => self.read_map_entry(table, index),
        })
    }

    /// Overwrite the table entry for `virt` in `space`.
    ///
    /// Performs no TLB maintenance.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if no page table is linked for `virt`.
    pub fn write_table_entry(
        &mut self,
        space: RootPage,
        virt: VirtualAddress,
        entry: PageEntry,
    ) -> Result<(), VmemError> {
        let table = self.linked_table(space, virt)?;
        let index = TableIndex::of(virt);
        match self.access(space) {
            // SAFETY: `linked_table` checked that the slot links a page table.
            Access::Current => unsafe { self.mmu.active_table(DirectoryIndex::of(virt)) }.set(index, entry),
            Access::Foreign(_) => self.write_map_entry(table, index, entry),
        }
        Ok(())
    }

    fn linked_table(
        &mut self,
        space: RootPage,
        virt: VirtualAddress,
    ) -> Result<PhysicalPage<Size4K>, VmemError> {
        self.read_directory_entry(space, virt)
            .frame()
            .ok_or(VmemError::NotMapped(virt))
    }

    /// Map one page `virt -> phys` in `space`.
    ///
    /// With [`MapFlags::LARGE_PAGE`] the directory entry itself maps a 4 MiB
    /// page; otherwise the covering page table must already be linked.
    ///
    /// # Errors
    /// - [`VmemError::InvalidArgument`] for misaligned or out-of-range addresses.
    /// - [`VmemError::NotMapped`] if a 4 KiB mapping has no page table.
    /// - [`VmemError::AlreadyMapped`] if the target entry is present. The
    ///   existing translation is left untouched.
    pub fn map_page(
        &mut self,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: MapFlags,
        space: RootPage,
    ) -> Result<(), VmemError> {
        let large = flags.contains(MapFlags::LARGE_PAGE);
        validate_mapping(virt, phys, large)?;

        let entry = PageEntry::leaf(phys, flags);
        let pde = self.read_directory_entry(space, virt);

        if large {
            if pde.present() {
                error!("Refusing to map {virt} -> {phys}: directory entry already present");
                return Err(VmemError::AlreadyMapped(virt));
            }
            self.write_directory_entry(space, virt, entry);
        } else {
            if !pde.present() {
                debug!("Cannot map {virt} -> {phys}: no page table");
                return Err(VmemError::NotMapped(virt));
            }
            if pde.large_page() || self.read_table_entry(space, virt)?.present() {
                error!("Refusing to map {virt} -> {phys}: already mapped");
                return Err(VmemError::AlreadyMapped(virt));
            }
            self.write_table_entry(space, virt, entry)?;
        }

        trace!("Mapped {virt} -> {phys} ({flags:?}) in {space}");
        self.invalidate_if_current(space, virt);
        Ok(())
    }

    /// Remove the mapping of `virt` in `space` and return the frame it
    /// pointed at. A large page is unmapped as a whole.
    ///
    /// # Errors
    /// - [`VmemError::InvalidArgument`] if `virt` is beyond 4 GiB.
    /// - [`VmemError::NotMapped`] if nothing is mapped at `virt`.
    pub fn unmap_page(
        &mut self,
        virt: VirtualAddress,
        space: RootPage,
    ) -> Result<PhysicalAddress, VmemError> {
        if !virt.is_translatable() {
            return Err(VmemError::InvalidArgument("virtual address beyond 4 GiB"));
        }

        let pde = self.read_directory_entry(space, virt);
        let phys = if let Some(large) = pde.large_frame() {
            self.write_directory_entry(space, virt, PageEntry::new());
            large.base()
        } else {
            let pte = self.read_table_entry(space, virt)?;
            if !pte.present() {
                return Err(VmemError::NotMapped(virt));
            }
            self.write_table_entry(space, virt, PageEntry::new())?;
            pte.physical_address()
        };

        trace!("Unmapped {virt} (was {phys}) in {space}");
        self.invalidate_if_current(space, virt);
        Ok(phys)
    }

    /// Link the page table in `table` for the 4 MiB region containing `virt`.
    ///
    /// # Errors
    /// - [`VmemError::InvalidArgument`] for out-of-range addresses.
    /// - [`VmemError::AlreadyMapped`] if the directory entry is present.
    pub fn map_page_table(
        &mut self,
        virt: VirtualAddress,
        table: PhysicalPage<Size4K>,
        flags: MapFlags,
        space: RootPage,
    ) -> Result<(), VmemError> {
        validate_mapping(virt.align_down::<Size4K>(), table.base(), false)?;

        if self.read_directory_entry(space, virt).present() {
            error!("Refusing to link table {table} at {virt}: directory entry already present");
            return Err(VmemError::AlreadyMapped(virt));
        }

        self.write_directory_entry(space, virt, PageEntry::table(table, flags));
        debug!("Linked page table {table} for {virt} in {space}");
        self.invalidate_region_if_current(space);
        Ok(())
    }

    /// Unlink the page table covering `virt` and return its frame.
    ///
    /// # Errors
    /// - [`VmemError::InvalidArgument`] if `virt` is beyond 4 GiB or the slot
    ///   maps a large page (use [`unmap_page`](Self::unmap_page)).
    /// - [`VmemError::NotMapped`] if the directory entry is absent.
    pub fn unmap_page_table(
        &mut self,
        virt: VirtualAddress,
        space: RootPage,
    ) -> Result<PhysicalPage<Size4K>, VmemError> {
        if !virt.is_translatable() {
            return Err(VmemError::InvalidArgument("virtual address beyond 4 GiB"));
        }

        let pde = self.read_directory_entry(space, virt);
        if !pde.present() {
            return Err(VmemError::NotMapped(virt));
        }
        let Some(table) = pde.frame() else {
            return Err(VmemError::InvalidArgument("slot maps a large page"));
        };

        self.write_directory_entry(space, virt, PageEntry::new());
        debug!("Unlinked page table {table} for {virt} in {space}");
        self.invalidate_region_if_current(space);
        Ok(table)
    }

    /// Translate `virt` in `space`, honouring 4 MiB pages.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if either level is absent.
    pub fn translate(
        &mut self,
        virt: VirtualAddress,
        space: RootPage,
    ) -> Result<PhysicalAddress, VmemError> {
        if !virt.is_translatable() {
            return Err(VmemError::InvalidArgument("virtual address beyond 4 GiB"));
        }

        let pde = self.read_directory_entry(space, virt);
        if let Some(large) = pde.large_frame() {
            return Ok(large.join(virt.offset::<Size4M>()));
        }

        let pte = self.read_table_entry(space, virt)?;
        if !pte.present() {
            return Err(VmemError::NotMapped(virt));
        }
        let frame = PhysicalPage::<Size4K>::containing_address(pte.physical_address());
        Ok(frame.join(virt.offset::<Size4K>()))
    }

    /// Whether `virt` has a present translation in `space`.
    pub fn is_readable(&mut self, virt: VirtualAddress, space: RootPage) -> bool {
        self.translate(virt, space).is_ok()
    }

    /// Whether `virt` is present and writable at both levels in `space`.
    pub fn is_writable(&mut self, virt: VirtualAddress, space: RootPage) -> bool {
        if !virt.is_translatable() {
            return false;
        }
        let pde = self.read_directory_entry(space, virt);
        if !pde.present() || !pde.writable() {
            return false;
        }
        if pde.large_page() {
            return true;
        }
        self.read_table_entry(space, virt)
            .is_ok_and(|pte| pte.present() && pte.writable())
    }

    /// `invlpg` for the page containing `virt`.
    #[inline]
    pub fn invalidate_page(&mut self, virt: VirtualAddress) {
        self.mmu.invalidate_page(virt.page());
    }

    /// Full TLB flush (CR3 reload).
    #[inline]
    pub fn invalidate_all(&mut self) {
        self.mmu.invalidate_all();
    }

    fn invalidate_if_current(&mut self, space: RootPage, virt: VirtualAddress) {
        if self.access(space) == Access::Current {
            self.invalidate_page(virt);
        }
    }

    /// A directory change affects 1024 translations and the recursive view of
    /// the table itself; reload CR3 instead of issuing 1025 `invlpg`s.
    fn invalidate_region_if_current(&mut self, space: RootPage) {
        if self.access(space) == Access::Current {
            self.invalidate_all();
        }
    }
}

fn validate_mapping(
    virt: VirtualAddress,
    phys: PhysicalAddress,
    large: bool,
) -> Result<(), VmemError> {
    if !virt.is_translatable() {
        return Err(VmemError::InvalidArgument("virtual address beyond 4 GiB"));
    }
    if !phys.fits_legacy_entry() {
        return Err(VmemError::InvalidArgument("physical address beyond 4 GiB"));
    }
    let aligned = if large {
        virt.is_aligned::<Size4M>() && phys.is_aligned::<Size4M>()
    } else {
        virt.is_aligned::<Size4K>() && phys.is_aligned::<Size4K>()
    };
    if aligned {
        Ok(())
    } else {
        Err(VmemError::InvalidArgument("address not page aligned"))
    }
}
