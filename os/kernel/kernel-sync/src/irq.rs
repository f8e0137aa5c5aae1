use crate::{SpinLock, SpinLockGuard};
use core::ops::{Deref, DerefMut};

/// A spin-lock guard that also disables interrupts while held.
///
/// Created via [`SpinLock::lock_irq`]. It saves the interrupt state and
/// disables interrupts, then acquires the lock; both are released in reverse
/// order on drop.
///
/// This is the exclusion discipline of the memory manager: its frame stack,
/// registry and temporary mapping window are only ever touched with
/// interrupts off, so a handler can never re-enter a half-finished mutation.
///
/// # Platform
///
/// Uses `cli/sti` and `pushfd/pop` on bare-metal x86. On any other target the
/// interrupt half is a no-op so that host tests exercise the locking logic.
pub struct IrqSpinLockGuard<'a, T> {
    // Field order matters: the lock is released before interrupts come back.
    guard: SpinLockGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> SpinLock<T> {
    /// Acquires the lock with interrupts disabled for the guard's lifetime.
    #[inline]
    pub fn lock_irq(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        let guard = self.lock();
        IrqSpinLockGuard { guard, _irq: irq }
    }
}

impl<T> Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(all(target_os = "none", target_arch = "x86"))]
mod arch {
    /// Disables hardware interrupts (`cli`).
    #[inline]
    pub fn cli_stop_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    /// Enables hardware interrupts (`sti`).
    #[inline]
    pub fn sti_enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    /// Returns the current `EFLAGS` value (via `pushfd/pop`).
    #[inline]
    #[must_use]
    pub fn eflags() -> u32 {
        let r: u32;
        unsafe { core::arch::asm!("pushfd; pop {}", out(reg) r, options(preserves_flags)) }
        r
    }

    /// Interrupt flag (`IF`, bit 9).
    #[inline]
    #[must_use]
    pub fn interrupts_enabled() -> bool {
        eflags() & (1 << 9) != 0
    }
}

#[cfg(not(all(target_os = "none", target_arch = "x86")))]
mod arch {
    #[inline]
    pub const fn cli_stop_interrupts() {}

    #[inline]
    pub const fn sti_enable_interrupts() {}

    #[inline]
    #[must_use]
    pub const fn interrupts_enabled() -> bool {
        false
    }
}

pub use arch::{cli_stop_interrupts, interrupts_enabled, sti_enable_interrupts};

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the `IF` bit. If interrupts were enabled, it
/// executes `cli`. On drop, it executes `sti` **only** if they were previously
/// enabled, so guards nest.
pub struct IrqGuard {
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }

    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}
