use kernel_alloc::{FrameAllocError, HeapError};
use kernel_aspace::RegistryError;
use kernel_sched::SchedError;
use kernel_vmem::{RootPage, VmemError};

/// Errors of the memory manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MmError {
    /// No frame is left, even after reclaiming the heap tail.
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The operation would tear down the page directory loaded in CR3.
    #[error("address space {0} is active")]
    ActiveSpace(RootPage),
    #[error(transparent)]
    Vmem(#[from] VmemError),
    /// Frame allocator failure other than exhaustion.
    #[error(transparent)]
    Frame(FrameAllocError),
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Sched(#[from] SchedError),
}

impl From<FrameAllocError> for MmError {
    fn from(e: FrameAllocError) -> Self {
        match e {
            FrameAllocError::OutOfMemory => Self::OutOfMemory,
            other => Self::Frame(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_is_surfaced_as_out_of_memory() {
        assert_eq!(MmError::from(FrameAllocError::OutOfMemory), MmError::OutOfMemory);
        assert_eq!(
            MmError::from(FrameAllocError::StackFull),
            MmError::Frame(FrameAllocError::StackFull)
        );
    }
}
