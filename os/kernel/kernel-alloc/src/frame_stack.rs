//! # Free Frame Stack
//!
//! A LIFO of free 4 KiB frames kept in caller-provided `'static` storage.
//! In the kernel that storage is a region the loader maps before the heap
//! exists, so the allocator never depends on the allocator. A push beyond
//! the storage is refused rather than grown.

use crate::FrameAllocError;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use log::{debug, error, warn};

/// Something that can hand frames back when the stack runs dry.
pub trait Reclaim {
    /// Push reclaimed frames onto `frames` and return how many were pushed.
    fn reclaim(&mut self, frames: &mut FrameStack) -> usize;
}

/// A [`Reclaim`] that never finds anything.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoReclaim;

impl Reclaim for NoReclaim {
    fn reclaim(&mut self, _frames: &mut FrameStack) -> usize {
        0
    }
}

/// Bounded LIFO of free physical frames.
///
/// Slots at and above `top` hold stale values and are never read.
#[derive(Debug)]
pub struct FrameStack {
    slots: &'static mut [PhysicalPage<Size4K>],
    top: usize,
}

impl FrameStack {
    /// An empty stack holding at most `slots.len()` frames.
    #[must_use]
    pub const fn new(slots: &'static mut [PhysicalPage<Size4K>]) -> Self {
        Self { slots, top: 0 }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.top
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.top == 0
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.top >= self.slots.len()
    }

    /// Take the most recently freed frame, without reclamation.
    #[inline]
    pub const fn pop(&mut self) -> Option<PhysicalPage<Size4K>> {
        if self.top == 0 {
            return None;
        }
        self.top -= 1;
        Some(self.slots[self.top])
    }

    fn push(&mut self, frame: PhysicalPage<Size4K>) -> bool {
        match self.slots.get_mut(self.top) {
            Some(slot) => {
                *slot = frame;
                self.top += 1;
                true
            }
            None => false,
        }
    }

    /// Take a frame, running `reclaim` first if the stack is empty.
    ///
    /// # Errors
    /// [`FrameAllocError::OutOfMemory`] if the stack is still empty after
    /// reclamation.
    pub fn allocate<R: Reclaim + ?Sized>(
        &mut self,
        reclaim: &mut R,
    ) -> Result<PhysicalPage<Size4K>, FrameAllocError> {
        if self.is_empty() {
            warn!("Free frame stack is empty; reclaiming unused heap pages");
            let reclaimed = reclaim.reclaim(self);
            debug!("Reclaimed {reclaimed} frames");
        }

        let frame = self.pop().ok_or(FrameAllocError::OutOfMemory)?;
        debug_assert!(frame.base().is_aligned::<Size4K>());
        Ok(frame)
    }

    /// Return `frame` to the stack.
    ///
    /// # Errors
    /// - [`FrameAllocError::Unaligned`] if `frame` is not page aligned.
    /// - [`FrameAllocError::StackFull`] if the storage is used up.
    pub fn free(&mut self, frame: PhysicalAddress) -> Result<(), FrameAllocError> {
        let Ok(page) = PhysicalPage::<Size4K>::try_from(frame) else {
            error!("Refusing to free unaligned frame {frame}");
            return Err(FrameAllocError::Unaligned(frame));
        };
        if !self.push(page) {
            warn!("Free frame stack full; dropping {frame}");
            return Err(FrameAllocError::StackFull);
        }
        Ok(())
    }

    /// Push every frame of `frames` until the stack is full.
    ///
    /// Returns the number of frames pushed.
    pub fn seed(&mut self, frames: impl IntoIterator<Item = PhysicalPage<Size4K>>) -> usize {
        let before = self.top;
        for frame in frames {
            if !self.push(frame) {
                break;
            }
        }
        self.top - before
    }
}
