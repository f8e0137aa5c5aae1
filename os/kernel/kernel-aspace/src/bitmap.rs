//! # Page-Table Population Bitmap

use kernel_vmem::{DirectoryIndex, ENTRIES_PER_MAP};

const WORDS: usize = ENTRIES_PER_MAP / 64;

/// One bit per directory slot: set when a second-level table is installed.
#[derive(Clone, Eq, PartialEq)]
pub struct TableBitmap([u64; WORDS]);

impl TableBitmap {
    #[must_use]
    pub const fn new() -> Self {
        Self([0; WORDS])
    }

    #[inline]
    const fn locate(slot: DirectoryIndex) -> (usize, u64) {
        let i = slot.as_usize();
        (i / 64, 1 << (i % 64))
    }

    #[must_use]
    pub const fn get(&self, slot: DirectoryIndex) -> bool {
        let (word, bit) = Self::locate(slot);
        self.0[word] & bit != 0
    }

    pub const fn set(&mut self, slot: DirectoryIndex, populated: bool) {
        let (word, bit) = Self::locate(slot);
        if populated {
            self.0[word] |= bit;
        } else {
            self.0[word] &= !bit;
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Populated slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DirectoryIndex> + '_ {
        DirectoryIndex::all().filter(|slot| self.get(*slot))
    }
}

impl Default for TableBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TableBitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter().map(DirectoryIndex::as_usize)).finish()
    }
}

const _: () = assert!(ENTRIES_PER_MAP.is_multiple_of(64));

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(i: u16) -> DirectoryIndex {
        DirectoryIndex::new(i).unwrap()
    }

    #[test]
    fn set_and_clear() {
        let mut b = TableBitmap::new();
        b.set(slot(0), true);
        b.set(slot(63), true);
        b.set(slot(64), true);
        b.set(slot(1023), true);
        assert_eq!(b.count(), 4);
        b.set(slot(63), false);
        assert!(!b.get(slot(63)));
        assert!(b.get(slot(64)));
        assert_eq!(b.iter().map(DirectoryIndex::as_usize).collect::<Vec<_>>(), [0, 64, 1023]);
    }
}
