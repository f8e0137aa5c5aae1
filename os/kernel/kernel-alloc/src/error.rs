use kernel_memory_addresses::PhysicalAddress;

/// Errors of the physical frame allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameAllocError {
    /// The stack is empty even after heap-tail reclamation.
    #[error("out of physical memory")]
    OutOfMemory,
    /// A frame address handed back was not page aligned.
    #[error("frame address {0} is not page aligned")]
    Unaligned(PhysicalAddress),
    /// The pre-reserved stack storage is exhausted.
    #[error("free frame stack is full")]
    StackFull,
}

/// Errors of the kernel heap boundary manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// The heap end was queried before the heap was first extended.
    #[error("kernel heap is not initialized")]
    Uninitialized,
}
