//! # Spin Lock
//!
//! A test-and-test-and-set lock around a value. It never sleeps and never
//! records an owner; on the single-core kernel it is only ever contended by
//! an interrupt handler, which [`lock_irq`](SpinLock::lock_irq) rules out.

use core::cell::UnsafeCell;
use core::fmt;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A value guarded by a busy-waiting lock.
pub struct SpinLock<T> {
    held: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: the flag hands out at most one guard at a time, so `&SpinLock<T>`
// only ever gives one thread access to `T`.
unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            held: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Take the lock if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        // A weak exchange may fail spuriously; only give up when held.
        loop {
            if self.acquire() {
                return Some(SpinLockGuard { lock: self });
            }
            if self.is_locked() {
                return None;
            }
        }
    }

    /// Spin until the lock is taken.
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while !self.acquire() {
            while self.is_locked() {
                spin_loop();
            }
        }
        SpinLockGuard { lock: self }
    }

    /// Run `f` with the lock held.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Whether a guard currently exists. Only a hint under contention.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never block in a formatter; a held lock is reported as such.
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("value", &*guard).finish(),
            None => f.write_str("SpinLock { <locked> }"),
        }
    }
}

/// Exclusive access to the value of a [`SpinLock`]; unlocks on drop.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard is the only way to reach the value while held.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` makes the borrow unique.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_does_not_block_on_a_held_lock() {
        let l = SpinLock::new(5_u8);
        assert_eq!(format!("{l:?}"), "SpinLock { value: 5 }");
        let _g = l.lock();
        assert!(l.is_locked());
        assert_eq!(format!("{l:?}"), "SpinLock { <locked> }");
    }

    #[test]
    fn into_inner_returns_the_value() {
        let l = SpinLock::new(vec![1, 2]);
        l.lock().push(3);
        assert_eq!(l.into_inner(), [1, 2, 3]);
    }
}
