//! # Scheduler Core
//!
//! Fixed-priority preemptive scheduling policy, expressed as a small
//! set of callbacks the wait/notify engine and kernel façade drive:
//! [`Scheduler::admit`], [`Scheduler::pick_next`], [`Scheduler::on_exit`],
//! [`Scheduler::on_wait`], [`Scheduler::on_notify`], [`Scheduler::on_sleep`].
//!
//! A single concrete type is used rather than a scheduler trait or a
//! function-pointer table: fixed-priority preemptive scheduling is the
//! only policy this kernel implements, and a second implementation
//! would be needed before an abstraction over "the" scheduler earns
//! its keep.

use crate::config::MAX_TASKS;
use crate::heap::{HeapKey, PriorityHeap};
use crate::tcb::{TaskControlBlock, TaskState};

/// Failure mode of [`Scheduler::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    /// The runnable-task table already holds `MAX_TASKS` entries.
    CapacityReached,
}

/// Owns the runnable and sleeping task queues and the tick counter.
pub struct Scheduler {
    runnable: PriorityHeap<MAX_TASKS>,
    sleeping: PriorityHeap<MAX_TASKS>,
    idle: *mut TaskControlBlock,
    tick: u32,
}

// Scheduler state is only ever touched under a critical section (see
// `crate::sync`) or via the atomic wait/notify protocol in `crate::kernel`.
unsafe impl Send for Scheduler {}
unsafe impl Sync for Scheduler {}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            runnable: PriorityHeap::new(HeapKey::ByPriority),
            sleeping: PriorityHeap::new(HeapKey::ByDatum),
            idle: core::ptr::null_mut(),
            tick: 0,
        }
    }

    /// Registers the task that runs when nothing else is runnable.
    /// Must be called once, before `start`, and the idle TCB must
    /// never also be passed to `admit`.
    pub fn set_idle_task(&mut self, idle: *mut TaskControlBlock) {
        self.idle = idle;
    }

    /// Assigns `priority` to `tcb` and inserts it into the runnable
    /// queue. Fails if the queue is already at `MAX_TASKS`.
    pub fn admit(&mut self, tcb: *mut TaskControlBlock, priority: u8) -> Result<(), AdmitError> {
        if self.runnable.is_full() {
            return Err(AdmitError::CapacityReached);
        }
        unsafe {
            (*tcb).priority = priority;
        }
        self.runnable.insert(tcb);
        Ok(())
    }

    /// Moves any sleeper whose wake-tick has arrived into the runnable
    /// queue. Returns `true` if at least one task was woken.
    fn drain_sleepers(&mut self) -> bool {
        let mut woke_any = false;
        while let Some(candidate) = self.sleeping.peek_min() {
            let due = unsafe { (*candidate).datum } <= self.tick;
            if !due {
                break;
            }
            self.sleeping.extract_min();
            unsafe {
                (*candidate).state.remove(TaskState::SLEEP);
                (*candidate).datum = 0;
            }
            self.runnable.insert(candidate);
            woke_any = true;
        }
        woke_any
    }

    /// Selects the task that should run next: drains due sleepers,
    /// then returns the highest-priority runnable task, falling back
    /// to the idle task if none is runnable.
    pub fn pick_next(&mut self) -> *mut TaskControlBlock {
        self.drain_sleepers();
        self.runnable.peek_min().unwrap_or(self.idle)
    }

    /// Removes the exiting task from the runnable queue. Its storage
    /// is caller-owned and is not reclaimed here.
    pub fn on_exit(&mut self, tcb: *mut TaskControlBlock) {
        self.runnable.remove(tcb);
    }

    /// Moves `tcb` out of the runnable queue and into `queue`.
    pub fn on_wait(&mut self, queue: &mut PriorityHeap<MAX_TASKS>, tcb: *mut TaskControlBlock) {
        self.runnable.remove(tcb);
        queue.insert(tcb);
    }

    /// Moves the highest-priority waiter out of `queue` and back into
    /// the runnable queue. No-op if `queue` is empty.
    pub fn on_notify(&mut self, queue: &mut PriorityHeap<MAX_TASKS>) -> Option<*mut TaskControlBlock> {
        let woken = queue.extract_min()?;
        self.runnable.insert(woken);
        Some(woken)
    }

    /// Moves `tcb` out of the runnable queue and into the sleeping
    /// queue, to wake no earlier than `duration` ticks from now.
    pub fn on_sleep(&mut self, tcb: *mut TaskControlBlock, duration: u32) {
        self.runnable.remove(tcb);
        unsafe {
            (*tcb).datum = self.tick.wrapping_add(duration);
            (*tcb).state.insert(TaskState::SLEEP);
        }
        self.sleeping.insert(tcb);
    }

    /// Advances the tick counter and drains any sleepers now due.
    /// Returns `true` if a reschedule should be requested.
    pub fn tick(&mut self) -> bool {
        self.tick = self.tick.wrapping_add(1);
        self.drain_sleepers()
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.tick
    }

    pub fn runnable_len(&self) -> usize {
        self.runnable.len()
    }

    pub fn sleeping_len(&self) -> usize {
        self.sleeping.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcb(priority: u8) -> TaskControlBlock {
        let mut t = TaskControlBlock::new();
        t.priority = priority;
        t
    }

    #[test]
    fn picks_highest_priority_first() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);

        let mut low = tcb(0);
        let mut high = tcb(0);
        let mut mid = tcb(0);
        sched.admit(&mut low as *mut _, 5).unwrap();
        sched.admit(&mut high as *mut _, 1).unwrap();
        sched.admit(&mut mid as *mut _, 3).unwrap();

        let next = sched.pick_next();
        assert_eq!(unsafe { (*next).priority }, 1);
    }

    #[test]
    fn falls_back_to_idle_when_nothing_runnable() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);
        assert_eq!(sched.pick_next(), &mut idle as *mut _);
    }

    #[test]
    fn admit_fails_past_capacity() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);
        let mut tasks = [(); MAX_TASKS].map(|_| tcb(1));
        for t in tasks.iter_mut() {
            sched.admit(t as *mut _, 1).unwrap();
        }
        let mut overflow = tcb(1);
        assert_eq!(sched.admit(&mut overflow as *mut _, 1), Err(AdmitError::CapacityReached));
    }

    #[test]
    fn sleep_wakes_in_tick_order() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);

        let mut a = tcb(1);
        let mut b = tcb(1);
        let mut c = tcb(1);
        sched.admit(&mut a as *mut _, 1).unwrap();
        sched.admit(&mut b as *mut _, 1).unwrap();
        sched.admit(&mut c as *mut _, 1).unwrap();

        sched.on_sleep(&mut a as *mut _, 10000);
        sched.on_sleep(&mut b as *mut _, 5000);
        sched.on_sleep(&mut c as *mut _, 1000);
        assert_eq!(sched.runnable_len(), 0);
        assert_eq!(sched.sleeping_len(), 3);

        // Each woken task is removed once observed, as on_exit would do
        // for a real task that ran and finished: otherwise it lingers in
        // the runnable heap at the same priority as the next arrival and
        // the tie-break between equal keys is unspecified.
        for _ in 0..1000 {
            sched.tick();
        }
        let woken = sched.pick_next();
        assert_eq!(woken, &mut c as *mut _);
        sched.on_exit(woken);

        for _ in 0..4000 {
            sched.tick();
        }
        let woken = sched.pick_next();
        assert_eq!(woken, &mut b as *mut _);
        sched.on_exit(woken);

        for _ in 0..5000 {
            sched.tick();
        }
        let woken = sched.pick_next();
        assert_eq!(woken, &mut a as *mut _);
        sched.on_exit(woken);

        assert_eq!(sched.runnable_len(), 0);
        assert_eq!(sched.sleeping_len(), 0);
    }

    #[test]
    fn s2_fixed_priority_ordering_six_tasks() {
        // Six tasks admitted with priorities {1,3,2,5,4,1}: dispatch
        // order must be ascending by priority, with the two priority-1
        // tasks (indices 0 and 5) dispatched before anything else, in
        // either relative order.
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);

        let priorities = [1u8, 3, 2, 5, 4, 1];
        let mut tasks = priorities.map(|_| TaskControlBlock::new());
        for (i, t) in tasks.iter_mut().enumerate() {
            t.datum = i as u32;
        }
        for (i, &p) in priorities.iter().enumerate() {
            sched.admit(&mut tasks[i] as *mut _, p).unwrap();
        }

        let mut dispatched_ids = std::vec::Vec::new();
        for _ in 0..priorities.len() {
            let next = sched.pick_next();
            let id = unsafe { (*next).datum } as usize;
            dispatched_ids.push(id);
            sched.on_exit(next);
        }

        let dispatched_priorities: std::vec::Vec<u8> = dispatched_ids.iter().map(|&id| priorities[id]).collect();
        assert_eq!(dispatched_priorities, std::vec::Vec::from([1, 1, 2, 3, 4, 5]));

        let mut first_two = dispatched_ids[..2].to_vec();
        first_two.sort_unstable();
        assert_eq!(first_two, std::vec::Vec::from([0, 5]));
    }

    #[test]
    fn wait_and_notify_move_between_queues() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);
        let mut waiter = tcb(2);
        sched.admit(&mut waiter as *mut _, 2).unwrap();

        let mut queue: PriorityHeap<MAX_TASKS> = PriorityHeap::new(HeapKey::ByPriority);
        sched.on_wait(&mut queue, &mut waiter as *mut _);
        assert_eq!(sched.runnable_len(), 0);
        assert_eq!(queue.len(), 1);

        let woken = sched.on_notify(&mut queue).unwrap();
        assert_eq!(woken, &mut waiter as *mut _);
        assert_eq!(sched.runnable_len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn on_notify_empty_queue_is_noop() {
        let mut sched = Scheduler::new();
        let mut idle = tcb(255);
        sched.set_idle_task(&mut idle as *mut _);
        let mut queue: PriorityHeap<MAX_TASKS> = PriorityHeap::new(HeapKey::ByPriority);
        assert!(sched.on_notify(&mut queue).is_none());
    }
}
