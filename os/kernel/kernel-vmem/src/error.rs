use kernel_memory_addresses::VirtualAddress;

/// Errors reported by the page-table manager and the memory accessor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmemError {
    /// Malformed input; checked before anything is mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The expected translation (or its page table) is absent.
    #[error("{0} is not mapped")]
    NotMapped(VirtualAddress),
    /// The target entry is already present.
    #[error("{0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    /// A page touched by a transfer is not accessible in the required mode.
    #[error("access to {0} would fault")]
    Fault(VirtualAddress),
}
