//! # Page Directory / Page Table Entries (32-bit)
//!
//! Legacy x86 paging uses the same 32-bit record layout at both levels. A
//! directory entry either points at a page table or, with `PS=1`, maps a
//! 4 MiB page directly. A table entry always maps a 4 KiB page.

use bitfield_struct::bitfield;
use bitflags::bitflags;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, Size4M};

/// A single 32-bit x86 PDE or PTE in its raw bitfield form.
///
/// ### Bit layout
///
/// | Bits   | Name / Mnemonic   | Meaning |
/// |--------|-------------------|---------|
/// | 0      | `P` (present)     | Valid entry if set |
/// | 1      | `RW`              | Writable if set |
/// | 2      | `US`              | User-mode accessible if set |
/// | 3      | `PWT`             | Write-through caching |
/// | 4      | `PCD`             | Disable caching |
/// | 5      | `A`               | Accessed |
/// | 6      | `D`               | Dirty (leaf only) |
/// | 7      | `PS`              | 4 MiB page (PDE only) |
/// | 8      | `G`               | Global (leaf only) |
/// | 9–11   | OS avail          | Reserved for OS use |
/// | 12–31  | `base`            | Physical frame bits [31:12] |
///
/// When `present` is clear every other field is meaningless and must never be
/// used as a translation.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntry;
/// let mut e = PageEntry::new();
/// e.set_present(true);
/// e.set_writable(true);
/// e.set_physical_address(PhysicalAddress::new(0x0012_3000));
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntry {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Effective write permission is the intersection over both levels.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write to a leaf.
    pub dirty: bool,

    /// Page Size (PS, bit 7).
    ///
    /// In a directory entry, set for a 4 MiB leaf. In a table entry the
    /// position is PAT and is always written as zero here.
    pub large_page: bool,

    /// Global (G, bit 8). Survives CR3 reloads.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical address bits [31:12].
    #[bits(20)]
    frame_bits_31_12: u32,
}

impl PageEntry {
    /// Flag bits below the frame field.
    const FLAG_MASK: u32 = 0xFFF;

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        #[allow(clippy::cast_possible_truncation)]
        self.set_frame_bits_31_12((phys.as_u64() >> 12) as u32);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new((self.frame_bits_31_12() as u64) << 12)
    }

    /// Build a present entry pointing at `phys` with the given flags.
    ///
    /// The caller is responsible for `phys` fitting 32 bits and being aligned
    /// for the entry kind.
    #[inline]
    #[must_use]
    pub const fn leaf(phys: PhysicalAddress, flags: MapFlags) -> Self {
        let mut e = Self::from_bits(flags.bits() & Self::FLAG_MASK);
        e.set_present(true);
        e.set_physical_address(phys);
        e
    }

    /// Build a present directory entry that links the page table in `table`.
    #[inline]
    #[must_use]
    pub const fn table(table: PhysicalPage<Size4K>, flags: MapFlags) -> Self {
        let mut e = Self::leaf(table.base(), flags);
        e.set_large_page(false);
        e
    }

    /// If present and not a large page, the linked 4 KiB frame.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage<Size4K>> {
        if self.present() && !self.large_page() {
            Some(PhysicalPage::containing_address(self.physical_address()))
        } else {
            None
        }
    }

    /// If present with `PS=1`, the 4 MiB page base.
    #[inline]
    #[must_use]
    pub const fn large_frame(self) -> Option<PhysicalPage<Size4M>> {
        if self.present() && self.large_page() {
            Some(PhysicalPage::containing_address(self.physical_address()))
        } else {
            None
        }
    }

    /// The flag part of the entry (low 12 bits) as [`MapFlags`], minus `P`.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> MapFlags {
        MapFlags::from_bits_truncate(self.into_bits() & Self::FLAG_MASK)
    }
}

bitflags! {
    /// Flags callers pass when installing a mapping.
    ///
    /// `PRESENT` is implied and never part of this set.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        /// Writes allowed. Without it the page is read-only.
        const WRITABLE       = 1 << 1;
        /// Accessible from ring 3.
        const USER           = 1 << 2;
        const WRITE_THROUGH  = 1 << 3;
        const CACHE_DISABLED = 1 << 4;
        /// Map a 4 MiB page straight from the directory entry.
        const LARGE_PAGE     = 1 << 7;
        const GLOBAL         = 1 << 8;
    }
}

impl MapFlags {
    /// Supervisor read/write, the usual flags for kernel data and page tables.
    pub const KERNEL_RW: Self = Self::WRITABLE;
    /// User read/write.
    pub const USER_RW: Self = Self::WRITABLE.union(Self::USER);
    /// User read-only.
    pub const USER_RO: Self = Self::USER;
}
