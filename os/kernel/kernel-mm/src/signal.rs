//! # IPC Signal Decoding
//!
//! A signal arrives as a packed word plus one argument:
//!
//! ```text
//! | 31-24 | 23-8      | 7-0  |
//! | 0     | thread id | kind |
//! ```

use kernel_info::thread::ThreadId;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::RootPage;

/// Kind byte of an exception signal; the argument is the faulting address.
pub const SIGNAL_EXCEPTION: u8 = 1;

/// Kind byte of a thread-exit signal.
pub const SIGNAL_EXIT: u8 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SignalKind {
    Exception,
    Exit,
    Other(u8),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub tid: ThreadId,
    pub arg: u32,
}

impl Signal {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(raw: u32, arg: u32) -> Self {
        let kind = match (raw & 0xFF) as u8 {
            SIGNAL_EXCEPTION => SignalKind::Exception,
            SIGNAL_EXIT => SignalKind::Exit,
            other => SignalKind::Other(other),
        };
        Self {
            kind,
            tid: ThreadId::new((raw >> 8) & 0xFFFF),
            arg,
        }
    }

    #[must_use]
    pub const fn encode(&self) -> u32 {
        let kind = match self.kind {
            SignalKind::Exception => SIGNAL_EXCEPTION,
            SignalKind::Exit => SIGNAL_EXIT,
            SignalKind::Other(k) => k,
        };
        ((self.tid.as_u32() & 0xFFFF) << 8) | (kind as u32)
    }
}

/// A fault to be serviced by the page-fault handler.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageFaultRequest {
    pub tid: ThreadId,
    pub space: RootPage,
    pub address: VirtualAddress,
}

/// What [`dispatch_signal`](crate::MemoryManager::dispatch_signal) did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SignalOutcome {
    PageFault(PageFaultRequest),
    /// The thread was unbound; `destroyed` names its space if that was the
    /// last thread.
    Released {
        tid: ThreadId,
        destroyed: Option<RootPage>,
    },
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_kind_and_thread() {
        let s = Signal::decode(0xAB12_3401, 0xDEAD_B000);
        assert_eq!(s.kind, SignalKind::Exception);
        assert_eq!(s.tid, ThreadId::new(0x1234));
        assert_eq!(s.arg, 0xDEAD_B000);

        assert_eq!(Signal::decode(0x0700 | 2, 0).kind, SignalKind::Exit);
        assert_eq!(Signal::decode(0x0700 | 9, 0).kind, SignalKind::Other(9));
    }

    #[test]
    fn encode_drops_high_byte() {
        let s = Signal::decode(0xFF00_0502, 0);
        assert_eq!(s.encode(), 0x0502);
        assert_eq!(Signal::decode(s.encode(), 0), s);
    }
}
