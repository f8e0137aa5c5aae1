use kernel_info::thread::ThreadId;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::RootPage;

/// Errors of the address space registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("address space {0} is already registered")]
    Duplicate(RootPage),
    /// The new region intersects the region starting at the given address.
    #[error("region overlaps the region at {0}")]
    Overlap(VirtualAddress),
    #[error("no address space {0}")]
    UnknownSpace(RootPage),
    #[error("thread {tid} is already bound to {space}")]
    AlreadyBound { tid: ThreadId, space: RootPage },
    #[error("thread {0} is not bound to any address space")]
    NotBound(ThreadId),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
