//! # Page Maps (directory and table)
//!
//! A page directory is a level-2 map and a page table is a level-1 map. Both
//! are one 4 KiB frame of 1024 [`PageEntry`] records, so a single type and a
//! single bounded index serve both levels.
//!
//! ```text
//! | 31‒22     | 21‒12  | 11‒0   |
//! | Directory | Table  | Offset |
//! ```

use crate::PageEntry;
use kernel_info::memory::{PAGE_TABLES_VIEW, RECURSIVE_SLOT};
use kernel_memory_addresses::VirtualAddress;

/// Entries per page map.
pub const ENTRIES_PER_MAP: usize = 1024;

/// Size of a page map, a page and a frame.
#[allow(clippy::cast_possible_truncation)]
pub const PAGE_SIZE: usize = kernel_info::memory::PAGE_SIZE as usize;

/// Bounded index into a [`PageMap`] (`0..1024`).
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntryIndex(u16);

/// Directory index: VA bits `[31:22]`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirectoryIndex(EntryIndex);

/// Table index: VA bits `[21:12]`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(EntryIndex);

impl EntryIndex {
    /// Returns `None` for values outside `0..1024`.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        if (v as usize) < ENTRIES_PER_MAP {
            Some(Self(v))
        } else {
            None
        }
    }

    #[inline]
    const fn masked(v: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self((v & 0x3FF) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Byte offset of this entry inside its map.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self) -> u64 {
        self.0 as u64 * 4
    }
}

impl DirectoryIndex {
    /// The slot that maps the directory onto itself.
    #[allow(clippy::cast_possible_truncation)]
    pub const RECURSIVE: Self = Self(EntryIndex(RECURSIVE_SLOT as u16));

    /// Extract bits `[31:22]` of `va`.
    #[inline]
    #[must_use]
    pub const fn of(va: VirtualAddress) -> Self {
        Self(EntryIndex::masked(va.as_u64() >> 22))
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        match EntryIndex::new(v) {
            Some(i) => Some(Self(i)),
            None => None,
        }
    }

    /// First virtual address covered by this directory slot.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new((self.0.0 as u64) << 22)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0.as_usize()
    }

    /// All 1024 directory slots in ascending order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ENTRIES_PER_MAP as u16).map(|i| Self(EntryIndex(i)))
    }
}

impl TableIndex {
    /// Extract bits `[21:12]` of `va`.
    #[inline]
    #[must_use]
    pub const fn of(va: VirtualAddress) -> Self {
        Self(EntryIndex::masked(va.as_u64() >> 12))
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        match EntryIndex::new(v) {
            Some(i) => Some(Self(i)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0.as_usize()
    }
}

impl From<DirectoryIndex> for EntryIndex {
    fn from(value: DirectoryIndex) -> Self {
        value.0
    }
}

impl From<TableIndex> for EntryIndex {
    fn from(value: TableIndex) -> Self {
        value.0
    }
}

/// One page directory or page table: 1024 entries, 4 KiB-aligned.
#[repr(C, align(4096))]
pub struct PageMap {
    entries: [PageEntry; ENTRIES_PER_MAP],
}

impl PageMap {
    /// A map with every entry non-present.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntry::new(); ENTRIES_PER_MAP],
        }
    }

    /// Plain load; does not imply any TLB synchronization.
    #[inline]
    #[must_use]
    pub fn get(&self, i: impl Into<EntryIndex>) -> PageEntry {
        self.entries[i.into().as_usize()]
    }

    /// Plain store. The caller handles TLB invalidation for active maps.
    #[inline]
    pub fn set(&mut self, i: impl Into<EntryIndex>, e: PageEntry) {
        self.entries[i.into().as_usize()] = e;
    }

    /// Iterate `(index, entry)` over present entries.
    pub fn present_entries(&self) -> impl Iterator<Item = (EntryIndex, PageEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.present())
            .map(|(i, e)| (EntryIndex::masked(i as u64), *e))
    }
}

const _: () = {
    assert!(size_of::<PageMap>() == PAGE_SIZE);
    assert!(align_of::<PageMap>() == PAGE_SIZE);
    assert!(RECURSIVE_SLOT < ENTRIES_PER_MAP);
    assert!(DirectoryIndex::RECURSIVE.base().as_u64() == PAGE_TABLES_VIEW);
};
