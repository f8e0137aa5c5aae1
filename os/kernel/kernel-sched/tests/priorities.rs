use kernel_info::thread::ThreadId;
use kernel_sched::{Priority, SchedError, Scheduler};

fn tid(n: u32) -> ThreadId {
    ThreadId::new(n)
}

fn scheduler_with(levels: &[u8]) -> Scheduler {
    let mut s = Scheduler::new();
    for (i, level) in levels.iter().enumerate() {
        let t = tid(u32::try_from(i).unwrap() + 10);
        s.register(t, Priority::new(*level).unwrap()).unwrap();
        s.attach_run_queue(t).unwrap();
    }
    s
}

#[test]
fn highest_priority_first_fifo_within_level() {
    let mut s = scheduler_with(&[3, 5, 3, 1]);
    let order: Vec<_> = core::iter::from_fn(|| s.schedule()).collect();
    assert_eq!(order, [tid(11), tid(10), tid(12), tid(13)]);
    let levels: Vec<_> = order.iter().map(|t| s.priority(*t).unwrap().level()).collect();
    assert_eq!(levels, [5, 3, 3, 1]);
}

#[test]
fn priority_change_requeues_at_tail() {
    let mut s = scheduler_with(&[3, 5, 3]);
    s.set_priority(tid(10), 5).unwrap();
    assert_eq!(s.schedule(), Some(tid(11)));
    assert_eq!(s.schedule(), Some(tid(10)));
    assert_eq!(s.schedule(), Some(tid(12)));
    assert_eq!(s.schedule(), None);
    assert_eq!(s.set_priority(tid(10), 7), Err(SchedError::InvalidPriority(7)));
}

#[test]
fn lowering_a_queued_thread_leaves_its_old_level() {
    let mut s = scheduler_with(&[5, 3, 5]);
    s.set_priority(tid(10), 1).unwrap();
    assert_eq!(s.ready_count(), 3);
    assert!(s.is_ready(tid(10)));

    assert_eq!(s.schedule(), Some(tid(12)));
    assert_eq!(s.schedule(), Some(tid(11)));
    assert_eq!(s.schedule(), Some(tid(10)));
    assert_eq!(s.schedule(), None);
}

#[test]
fn paused_threads_wake_in_tick_order() {
    let mut s = Scheduler::new();
    for n in 1..=3 {
        s.register(tid(n), Priority::NORMAL).unwrap();
    }
    s.attach_paused_queue(tid(1), 20).unwrap();
    s.attach_paused_queue(tid(2), 10).unwrap();
    s.attach_paused_queue(tid(3), 10).unwrap();

    assert_eq!(s.timer_tick(9), 0);
    assert_eq!(s.schedule(), None);

    assert_eq!(s.timer_tick(10), 2);
    assert!(s.is_paused(tid(1)));
    assert_eq!(s.schedule(), Some(tid(2)));

    assert_eq!(s.timer_tick(25), 1);
    assert_eq!(s.schedule(), Some(tid(3)));
    assert_eq!(s.schedule(), Some(tid(1)));
    assert_eq!(s.schedule(), Some(tid(2)));
}

#[test]
fn timer_tick_preempts_running_thread() {
    let mut s = scheduler_with(&[3, 3]);
    assert_eq!(s.schedule(), Some(tid(10)));
    s.timer_tick(1);
    assert!(s.is_ready(tid(10)));
    assert_eq!(s.schedule(), Some(tid(11)));
    s.timer_tick(2);
    assert_eq!(s.schedule(), Some(tid(10)));
}

#[test]
fn detached_paused_thread_never_wakes() {
    let mut s = Scheduler::new();
    s.register(tid(1), Priority::LOWEST).unwrap();
    s.attach_paused_queue(tid(1), 5).unwrap();
    s.detach_paused_queue(tid(1)).unwrap();
    assert_eq!(s.timer_tick(100), 0);
    assert_eq!(s.schedule(), None);
}
