use kernel_info::thread::ThreadId;

/// Errors of the run-queue scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    #[error("thread {0} is not known to the scheduler")]
    UnknownThread(ThreadId),
    #[error("thread {0} is already registered")]
    AlreadyRegistered(ThreadId),
    #[error("priority level {0} is out of range")]
    InvalidPriority(u8),
    #[error("thread {0} is not on the requested queue")]
    NotQueued(ThreadId),
    #[error("thread {0} is already queued")]
    AlreadyQueued(ThreadId),
}
