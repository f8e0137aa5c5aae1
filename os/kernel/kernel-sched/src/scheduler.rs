//! # Priority Run Queues
//!
//! Seven FIFO run queues, one per [`Priority`], and a paused queue ordered by
//! wake tick. Threads are referred to by [`ThreadId`] only; the scheduler
//! never touches stacks or register state.
//!
//! A registered thread is in exactly one state:
//!
//! ```text
//!            attach_run_queue            schedule
//! Detached ───────────────────► Ready ───────────► Running
//!    ▲  ▲                         ▲                   │
//!    │  └── detach_paused_queue ──┼── Paused ◄────────┘ attach_paused_queue
//!    │                            └── timer_tick (due)
//!    └──────── detach_run_queue / being replaced by schedule
//! ```

use crate::{PRIORITY_LEVELS, Priority, SchedError};
use alloc::collections::{BTreeMap, VecDeque};
use kernel_info::thread::ThreadId;
use log::{debug, trace};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Detached,
    Ready,
    Running,
    /// Key into the paused queue.
    Paused(u64, u64),
}

#[derive(Debug, Copy, Clone)]
struct ThreadEntry {
    priority: Priority,
    state: State,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    run_queues: [VecDeque<ThreadId>; PRIORITY_LEVELS],
    /// `(wake tick, arrival)` keeps equal ticks FIFO.
    paused: BTreeMap<(u64, u64), ThreadId>,
    threads: BTreeMap<ThreadId, ThreadEntry>,
    current: Option<ThreadId>,
    arrivals: u64,
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            run_queues: [const { VecDeque::new() }; PRIORITY_LEVELS],
            paused: BTreeMap::new(),
            threads: BTreeMap::new(),
            current: None,
            arrivals: 0,
        }
    }

    /// The thread picked by the last [`schedule`](Self::schedule).
    #[must_use]
    pub const fn current(&self) -> Option<ThreadId> {
        self.current
    }

    #[must_use]
    pub fn priority(&self, tid: ThreadId) -> Option<Priority> {
        self.threads.get(&tid).map(|t| t.priority)
    }

    #[must_use]
    pub fn is_ready(&self, tid: ThreadId) -> bool {
        self.threads.get(&tid).is_some_and(|t| t.state == State::Ready)
    }

    #[must_use]
    pub fn is_paused(&self, tid: ThreadId) -> bool {
        self.threads.get(&tid).is_some_and(|t| matches!(t.state, State::Paused(..)))
    }

    /// Number of threads waiting on run queues.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.run_queues.iter().map(VecDeque::len).sum()
    }

    /// Make `tid` known to the scheduler, detached.
    ///
    /// # Errors
    /// [`SchedError::AlreadyRegistered`] if `tid` is known.
    pub fn register(&mut self, tid: ThreadId, priority: Priority) -> Result<(), SchedError> {
        if self.threads.contains_key(&tid) {
            return Err(SchedError::AlreadyRegistered(tid));
        }
        self.threads.insert(
            tid,
            ThreadEntry {
                priority,
                state: State::Detached,
            },
        );
        debug!("Registered thread {tid} at priority {priority}");
        Ok(())
    }

    /// Forget `tid`, removing it from whatever queue it is on.
    ///
    /// # Errors
    /// [`SchedError::UnknownThread`] if `tid` is not registered.
    pub fn unregister(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        let entry = self.entry(tid)?;
        self.leave(tid, entry);
        self.threads.remove(&tid);
        debug!("Unregistered thread {tid}");
        Ok(())
    }

    /// Put `tid` at the tail of its priority's run queue. The running thread
    /// may attach itself, which gives up the processor.
    ///
    /// # Errors
    /// - [`SchedError::UnknownThread`] if `tid` is not registered.
    /// - [`SchedError::AlreadyQueued`] if it is ready or paused.
    pub fn attach_run_queue(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        let entry = self.entry(tid)?;
        match entry.state {
            State::Ready | State::Paused(..) => return Err(SchedError::AlreadyQueued(tid)),
            State::Running => self.current = None,
            State::Detached => {}
        }
        self.enqueue(tid, entry.priority);
        Ok(())
    }

    /// Take `tid` off its run queue.
    ///
    /// # Errors
    /// - [`SchedError::UnknownThread`] if `tid` is not registered.
    /// - [`SchedError::NotQueued`] if it is not ready.
    pub fn detach_run_queue(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        let entry = self.entry(tid)?;
        if entry.state != State::Ready {
            return Err(SchedError::NotQueued(tid));
        }
        self.leave(tid, entry);
        self.set_state(tid, State::Detached);
        Ok(())
    }

    /// Park `tid` until tick `wake_at`.
    ///
    /// # Errors
    /// - [`SchedError::UnknownThread`] if `tid` is not registered.
    /// - [`SchedError::AlreadyQueued`] if it is ready or paused.
    pub fn attach_paused_queue(&mut self, tid: ThreadId, wake_at: u64) -> Result<(), SchedError> {
        let entry = self.entry(tid)?;
        match entry.state {
            State::Ready | State::Paused(..) => return Err(SchedError::AlreadyQueued(tid)),
            State::Running => self.current = None,
            State::Detached => {}
        }
        let key = (wake_at, self.next_arrival());
        self.paused.insert(key, tid);
        self.set_state(tid, State::Paused(key.0, key.1));
        trace!("Thread {tid} paused until tick {wake_at}");
        Ok(())
    }

    /// Take `tid` off the paused queue without waking it.
    ///
    /// # Errors
    /// - [`SchedError::UnknownThread`] if `tid` is not registered.
    /// - [`SchedError::NotQueued`] if it is not paused.
    pub fn detach_paused_queue(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        let entry = self.entry(tid)?;
        if !matches!(entry.state, State::Paused(..)) {
            return Err(SchedError::NotQueued(tid));
        }
        self.leave(tid, entry);
        self.set_state(tid, State::Detached);
        Ok(())
    }

    /// Change the priority of `tid`. A ready thread moves to the tail of its
    /// new run queue.
    ///
    /// # Errors
    /// - [`SchedError::InvalidPriority`] if `level` is out of range.
    /// - [`SchedError::UnknownThread`] if `tid` is not registered.
    pub fn set_priority(&mut self, tid: ThreadId, level: u8) -> Result<(), SchedError> {
        let priority = Priority::new(level).ok_or(SchedError::InvalidPriority(level))?;
        let entry = self.entry(tid)?;
        if entry.state == State::Ready {
            self.leave(tid, entry);
            self.enqueue(tid, priority);
        }
        if let Some(t) = self.threads.get_mut(&tid) {
            t.priority = priority;
        }
        debug!("Thread {tid} priority {} -> {priority}", entry.priority);
        Ok(())
    }

    /// Pick the head of the highest non-empty run queue and make it current.
    ///
    /// The previously running thread is not put back; callers that want it
    /// to keep competing attach it first (as [`timer_tick`](Self::timer_tick)
    /// does).
    pub fn schedule(&mut self) -> Option<ThreadId> {
        if let Some(prev) = self.current.take() {
            self.set_state(prev, State::Detached);
        }
        let next = self.run_queues.iter_mut().rev().find_map(VecDeque::pop_front)?;
        self.set_state(next, State::Running);
        self.current = Some(next);
        trace!("Scheduled thread {next}");
        Some(next)
    }

    /// Wake every paused thread due at `now` and preempt the running thread
    /// to the tail of its run queue. Returns the number of woken threads.
    pub fn timer_tick(&mut self, now: u64) -> usize {
        let mut woken = 0;
        while let Some(entry) = self.paused.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let tid = entry.remove();
            if let Some(priority) = self.priority(tid) {
                self.enqueue(tid, priority);
                woken += 1;
            }
        }

        if let Some(tid) = self.current.take()
            && let Some(priority) = self.priority(tid)
        {
            self.enqueue(tid, priority);
        }
        woken
    }

    fn entry(&self, tid: ThreadId) -> Result<ThreadEntry, SchedError> {
        self.threads.get(&tid).copied().ok_or(SchedError::UnknownThread(tid))
    }

    fn set_state(&mut self, tid: ThreadId, state: State) {
        if let Some(t) = self.threads.get_mut(&tid) {
            t.state = state;
        }
    }

    const fn next_arrival(&mut self) -> u64 {
        self.arrivals = self.arrivals.wrapping_add(1);
        self.arrivals
    }

    fn enqueue(&mut self, tid: ThreadId, priority: Priority) {
        self.run_queues[priority.index()].push_back(tid);
        self.set_state(tid, State::Ready);
    }

    /// Remove `tid` from the queue its state says it is on.
    fn leave(&mut self, tid: ThreadId, entry: ThreadEntry) {
        match entry.state {
            State::Ready => {
                let queue = &mut self.run_queues[entry.priority.index()];
                if let Some(pos) = queue.iter().position(|t| *t == tid) {
                    queue.remove(pos);
                }
            }
            State::Paused(at, arrival) => {
                self.paused.remove(&(at, arrival));
            }
            State::Running => self.current = None,
            State::Detached => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    fn ready(s: &mut Scheduler, n: u32, level: u8) {
        s.register(tid(n), Priority::new(level).unwrap()).unwrap();
        s.attach_run_queue(tid(n)).unwrap();
    }

    #[test]
    fn double_attach_is_rejected() {
        let mut s = Scheduler::new();
        ready(&mut s, 1, 3);
        assert_eq!(s.attach_run_queue(tid(1)), Err(SchedError::AlreadyQueued(tid(1))));
        assert_eq!(s.attach_paused_queue(tid(1), 5), Err(SchedError::AlreadyQueued(tid(1))));
    }

    #[test]
    fn detach_requires_queue_membership() {
        let mut s = Scheduler::new();
        s.register(tid(1), Priority::NORMAL).unwrap();
        assert_eq!(s.detach_run_queue(tid(1)), Err(SchedError::NotQueued(tid(1))));
        assert_eq!(s.detach_paused_queue(tid(1)), Err(SchedError::NotQueued(tid(1))));
        assert_eq!(s.detach_run_queue(tid(9)), Err(SchedError::UnknownThread(tid(9))));
    }

    #[test]
    fn unregister_removes_from_queue() {
        let mut s = Scheduler::new();
        ready(&mut s, 1, 3);
        s.unregister(tid(1)).unwrap();
        assert_eq!(s.ready_count(), 0);
        assert_eq!(s.schedule(), None);
    }

    #[test]
    fn running_thread_can_yield() {
        let mut s = Scheduler::new();
        ready(&mut s, 1, 3);
        ready(&mut s, 2, 3);
        assert_eq!(s.schedule(), Some(tid(1)));
        s.attach_run_queue(tid(1)).unwrap();
        assert_eq!(s.current(), None);
        assert_eq!(s.schedule(), Some(tid(2)));
        assert_eq!(s.schedule(), Some(tid(1)));
    }
}
