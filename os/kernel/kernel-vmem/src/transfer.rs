//! # Cross-Address-Space Memory Access
//!
//! Copies bytes between a buffer of the caller (always in the active address
//! space) and a virtual range of any address space.
//!
//! Every page touched on the target side is checked before the first byte
//! moves: readable for reads, writable for writes. On failure nothing has
//! been copied. The copy then proceeds page by page because the target's
//! pages need not be physically contiguous. For a foreign space each page
//! goes through the temporary window; for the active space the page is
//! addressed directly.

use crate::page_map::PAGE_SIZE;
use crate::{Access, Mmu, PageTableManager, RootPage, VmemError};
use kernel_memory_addresses::{Size4K, VirtualAddress};
use log::trace;

/// Direction of a [`transfer`](PageTableManager::transfer).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// Target space to buffer.
    Read,
    /// Buffer to target space.
    Write,
}

/// The caller-side buffer of a transfer; its variant fixes the direction.
#[derive(Debug)]
pub enum TransferBuffer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl TransferBuffer<'_> {
    #[must_use]
    pub const fn direction(&self) -> Direction {
        match self {
            Self::Read(_) => Direction::Read,
            Self::Write(_) => Direction::Write,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Read(b) => b.len(),
            Self::Write(b) => b.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: Mmu> PageTableManager<M> {
    /// Copy `buffer.len()` bytes between `buffer` and `address` in `space`.
    ///
    /// # Errors
    /// - [`VmemError::InvalidArgument`] if the range leaves the 4 GiB space.
    /// - [`VmemError::Fault`] carrying the first inaccessible page; nothing
    ///   has been copied.
    pub fn transfer(
        &mut self,
        address: VirtualAddress,
        mut buffer: TransferBuffer<'_>,
        space: RootPage,
    ) -> Result<(), VmemError> {
        let len = buffer.len();
        if len == 0 {
            return Ok(());
        }
        let last = address
            .checked_add(len as u64 - 1)
            .filter(|a| a.is_translatable())
            .ok_or(VmemError::InvalidArgument("range beyond 4 GiB"))?;

        let direction = buffer.direction();
        self.check_range(address, last, direction, space)?;

        let access = self.access(space);
        let mut done = 0;
        while done < len {
            let at = address + done as u64;
            let (page, offset) = at.split::<Size4K>();
            let offset = offset.as_usize();
            let chunk = (PAGE_SIZE - offset).min(len - done);
            let range = done..done + chunk;

            match access {
                Access::Current => {
                    // SAFETY: `check_range` verified the page is mapped in
                    // the active space and nothing has changed it since.
                    let bytes = unsafe { self.mmu.active_page(page).as_mut() };
                    match &mut buffer {
                        TransferBuffer::Read(b) => b[range].copy_from_slice(&bytes[offset..offset + chunk]),
                        TransferBuffer::Write(b) => bytes[offset..offset + chunk].copy_from_slice(&b[range]),
                    }
                }
                Access::Foreign(_) => {
                    let phys = self.translate(at, space).map_err(|_| VmemError::Fault(at))?;
                    match &mut buffer {
                        TransferBuffer::Read(b) => self.peek(phys, &mut b[range]),
                        TransferBuffer::Write(b) => self.poke(phys, &b[range]),
                    }
                }
            }
            done += chunk;
        }

        trace!("Transferred {len} bytes ({direction:?}) at {address} in {space}");
        Ok(())
    }

    /// Read `buffer.len()` bytes at `address` in `space`.
    ///
    /// # Errors
    /// See [`transfer`](Self::transfer).
    pub fn peek_virt(
        &mut self,
        address: VirtualAddress,
        buffer: &mut [u8],
        space: RootPage,
    ) -> Result<(), VmemError> {
        self.transfer(address, TransferBuffer::Read(buffer), space)
    }

    /// Write `buffer` to `address` in `space`.
    ///
    /// # Errors
    /// See [`transfer`](Self::transfer).
    pub fn poke_virt(
        &mut self,
        address: VirtualAddress,
        buffer: &[u8],
        space: RootPage,
    ) -> Result<(), VmemError> {
        self.transfer(address, TransferBuffer::Write(buffer), space)
    }

    /// Whether every page of `first..=last` allows `direction` in `space`.
    fn check_range(
        &mut self,
        first: VirtualAddress,
        last: VirtualAddress,
        direction: Direction,
        space: RootPage,
    ) -> Result<(), VmemError> {
        let mut page = first.align_down::<Size4K>();
        loop {
            let ok = match direction {
                Direction::Read => self.is_readable(page, space),
                Direction::Write => self.is_writable(page, space),
            };
            if !ok {
                return Err(VmemError::Fault(page));
            }
            match page.checked_add(PAGE_SIZE as u64) {
                Some(next) if next <= last => page = next,
                _ => return Ok(()),
            }
        }
    }
}
