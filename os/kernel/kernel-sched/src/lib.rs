//! # Run-Queue Scheduler
//!
//! Priority-bucketed ready queues and a timer-ordered paused queue. See
//! [`Scheduler`] for the thread state machine.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod error;
mod priority;
mod scheduler;

pub use crate::error::SchedError;
pub use crate::priority::{PRIORITY_LEVELS, Priority};
pub use crate::scheduler::Scheduler;
