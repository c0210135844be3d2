//! # Task Control Block
//!
//! Defines the task record the scheduler, wait/notify engine, and
//! context-switch trampoline all operate on.
//!
//! A TCB does not own its stack. Callers provide a `'static` word slice
//! sized for the deepest call chain of the task plus the saved register
//! frame; this lets tasks of differing stack depths share one TCB type
//! without over-provisioning every task to the deepest one.

use bitflags::bitflags;

bitflags! {
    /// Bits of [`TaskControlBlock::state`].
    ///
    /// At most one of `SLEEP`/`WAIT` is meaningful at a time. `YIELD`
    /// is transient: set by [`crate::kernel::yield_now`] and cleared
    /// again once the task is re-dispatched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskState: u8 {
        const YIELD = 0b0000_0001;
        const SLEEP = 0b0000_0010;
        const WAIT  = 0b0000_0100;
    }
}

/// Task Control Block.
///
/// `sp` must remain the first field: the PendSV trampoline in
/// [`crate::arch::cortex_m4`] addresses it without going through a
/// named field.
#[repr(C)]
pub struct TaskControlBlock {
    /// Saved top-of-stack pointer. Valid only while the task is not
    /// the one currently executing.
    pub sp: *mut u32,
    /// Current lifecycle bits, see [`TaskState`].
    pub state: TaskState,
    /// Fixed scheduling priority; 1 is most urgent, 5 least.
    pub priority: u8,
    /// Scratch word: wake-tick while `SLEEP` is set, otherwise zero.
    pub datum: u32,
}

// A TCB is handed around as a raw pointer shared between the scheduler,
// wait-queues, and the currently-executing-task slot. All mutation is
// either performed by the task that owns it or under a critical section.
unsafe impl Send for TaskControlBlock {}
unsafe impl Sync for TaskControlBlock {}

impl TaskControlBlock {
    /// An uninitialized TCB, suitable for a `static mut` slot filled in
    /// by [`crate::kernel::create_task`].
    pub const fn new() -> Self {
        Self {
            sp: core::ptr::null_mut(),
            state: TaskState::empty(),
            priority: 0,
            datum: 0,
        }
    }

    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.state.contains(TaskState::WAIT)
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.state.contains(TaskState::SLEEP)
    }
}

impl Default for TaskControlBlock {
    fn default() -> Self {
        Self::new()
    }
}
