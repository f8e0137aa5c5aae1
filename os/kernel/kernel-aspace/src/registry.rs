//! # Address Space Registry
//!
//! All live address spaces keyed by the frame of their page directory, plus
//! the thread-to-space bindings. Both maps are ordered trees, so lookups and
//! updates are logarithmic in the number of spaces.

use crate::{AddressSpace, Region, RegistryError, VirtualRange};
use alloc::collections::BTreeMap;
use alloc::collections::btree_map::Entry;
use kernel_info::thread::ThreadId;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::RootPage;
use log::{debug, info, warn};

/// Result of [`AddressSpaceRegistry::unbind_thread`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Unbound {
    /// The space the thread was bound to.
    pub space: RootPage,
    /// Threads still bound to it.
    pub remaining: usize,
}

#[derive(Debug, Default)]
pub struct AddressSpaceRegistry {
    spaces: BTreeMap<RootPage, AddressSpace>,
    threads: BTreeMap<ThreadId, RootPage>,
}

impl AddressSpaceRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spaces: BTreeMap::new(),
            threads: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Register an empty record for `root`.
    ///
    /// # Errors
    /// [`RegistryError::Duplicate`] if `root` is already registered.
    pub fn create(&mut self, root: RootPage) -> Result<&mut AddressSpace, RegistryError> {
        self.add_address_space(AddressSpace::new(root))
    }

    /// Register a pre-built record.
    ///
    /// # Errors
    /// [`RegistryError::Duplicate`] if its root is already registered.
    pub fn add_address_space(&mut self, space: AddressSpace) -> Result<&mut AddressSpace, RegistryError> {
        let root = space.root();
        match self.spaces.entry(root) {
            Entry::Occupied(_) => {
                warn!("Address space {root} is already registered");
                Err(RegistryError::Duplicate(root))
            }
            Entry::Vacant(slot) => {
                info!("Registered address space {root}");
                Ok(slot.insert(space))
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, root: RootPage) -> Option<&AddressSpace> {
        self.spaces.get(&root)
    }

    pub fn lookup_mut(&mut self, root: RootPage) -> Option<&mut AddressSpace> {
        self.spaces.get_mut(&root)
    }

    fn space_mut(&mut self, root: RootPage) -> Result<&mut AddressSpace, RegistryError> {
        self.spaces.get_mut(&root).ok_or(RegistryError::UnknownSpace(root))
    }

    fn space(&self, root: RootPage) -> Result<&AddressSpace, RegistryError> {
        self.spaces.get(&root).ok_or(RegistryError::UnknownSpace(root))
    }

    /// Unregister `root`, dropping every thread binding that points at it.
    pub fn remove(&mut self, root: RootPage) -> Option<AddressSpace> {
        let space = self.spaces.remove(&root)?;
        for tid in space.threads() {
            self.threads.remove(&tid);
        }
        info!("Removed address space {root}");
        Some(space)
    }

    /// Add `region` to `root`.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownSpace`] if `root` is not registered.
    /// - [`RegistryError::InvalidArgument`] for an empty region.
    /// - [`RegistryError::Overlap`] if the region intersects an existing one.
    pub fn attach_region(&mut self, root: RootPage, region: Region) -> Result<(), RegistryError> {
        if region.virt.is_empty() {
            return Err(RegistryError::InvalidArgument("empty region"));
        }
        let space = self.space_mut(root)?;
        space.insert_region(region).map_err(|existing| {
            warn!(
                "Rejecting region {}+{:#x} in {root}: overlaps region at {}",
                region.virt.start, region.virt.length, existing.virt.start
            );
            RegistryError::Overlap(existing.virt.start)
        })?;
        debug!("Attached region {}+{:#x} to {root}", region.virt.start, region.virt.length);
        Ok(())
    }

    /// Whether `range` intersects a region of `root`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownSpace`] if `root` is not registered.
    pub fn region_overlaps(&self, root: RootPage, range: &VirtualRange) -> Result<bool, RegistryError> {
        Ok(self.space(root)?.overlapping(range).is_some())
    }

    /// The region of `root` containing `virt`.
    #[must_use]
    pub fn find_address(&self, root: RootPage, virt: VirtualAddress) -> Option<&Region> {
        self.spaces.get(&root)?.find(virt)
    }

    /// Bind `tid` to `root`. Binding a thread to the space it already belongs
    /// to is a no-op.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownSpace`] if `root` is not registered.
    /// - [`RegistryError::AlreadyBound`] if `tid` belongs to another space.
    pub fn bind_thread(&mut self, root: RootPage, tid: ThreadId) -> Result<(), RegistryError> {
        match self.threads.get(&tid) {
            Some(&bound) if bound == root => return Ok(()),
            Some(&bound) => {
                warn!("Thread {tid} is already bound to {bound}");
                return Err(RegistryError::AlreadyBound { tid, space: bound });
            }
            None => {}
        }
        self.space_mut(root)?.add_thread(tid);
        self.threads.insert(tid, root);
        debug!("Bound thread {tid} to {root}");
        Ok(())
    }

    /// Remove the binding of `tid`.
    ///
    /// # Errors
    /// [`RegistryError::NotBound`] if `tid` has no binding.
    pub fn unbind_thread(&mut self, tid: ThreadId) -> Result<Unbound, RegistryError> {
        let space = self.threads.remove(&tid).ok_or(RegistryError::NotBound(tid))?;
        let remaining = self.spaces.get_mut(&space).map_or(0, |s| {
            s.remove_thread(tid);
            s.thread_count()
        });
        debug!("Unbound thread {tid} from {space} ({remaining} left)");
        Ok(Unbound { space, remaining })
    }

    /// The space `tid` is bound to.
    #[must_use]
    pub fn resolve_thread(&self, tid: ThreadId) -> Option<RootPage> {
        self.threads.get(&tid).copied()
    }

    /// The record of the space `tid` is bound to.
    #[must_use]
    pub fn lookup_thread(&self, tid: ThreadId) -> Option<&AddressSpace> {
        self.spaces.get(self.threads.get(&tid)?)
    }

    /// Whether a second-level table is recorded for `virt` in `root`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownSpace`] if `root` is not registered.
    pub fn table_slot_status(&self, root: RootPage, virt: VirtualAddress) -> Result<bool, RegistryError> {
        Ok(self.space(root)?.table_slot_status(virt))
    }

    /// Record whether a second-level table is installed for `virt` in `root`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownSpace`] if `root` is not registered.
    pub fn set_table_slot_status(
        &mut self,
        root: RootPage,
        virt: VirtualAddress,
        populated: bool,
    ) -> Result<(), RegistryError> {
        self.space_mut(root)?.set_table_slot_status(virt, populated);
        Ok(())
    }

    /// All registered spaces in root order.
    pub fn iter(&self) -> impl Iterator<Item = &AddressSpace> {
        self.spaces.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionFlags;
    use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

    fn root(n: u64) -> RootPage {
        PhysicalPage::containing_address(PhysicalAddress::new(n * 0x1000))
    }

    #[test]
    fn create_rejects_duplicates() {
        let mut reg = AddressSpaceRegistry::new();
        reg.create(root(1)).unwrap();
        assert_eq!(reg.create(root(1)).err(), Some(RegistryError::Duplicate(root(1))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn empty_region_is_invalid() {
        let mut reg = AddressSpaceRegistry::new();
        reg.create(root(1)).unwrap();
        let empty = Region::anonymous(VirtualAddress::new(0x1000), 0, RegionFlags::empty());
        assert!(matches!(
            reg.attach_region(root(1), empty),
            Err(RegistryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_space_is_reported() {
        let mut reg = AddressSpaceRegistry::new();
        let r = Region::anonymous(VirtualAddress::new(0x1000), 0x1000, RegionFlags::empty());
        assert_eq!(reg.attach_region(root(9), r), Err(RegistryError::UnknownSpace(root(9))));
        assert_eq!(
            reg.bind_thread(root(9), ThreadId::new(3)),
            Err(RegistryError::UnknownSpace(root(9)))
        );
        assert_eq!(reg.resolve_thread(ThreadId::new(3)), None);
    }
}
