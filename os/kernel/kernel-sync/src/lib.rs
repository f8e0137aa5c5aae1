//! # Kernel synchronization primitives
//!
//! The memory manager runs on a single core; exclusion means "interrupts off
//! and the lock held", see [`SpinLock::lock_irq`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;

pub use irq::{IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
