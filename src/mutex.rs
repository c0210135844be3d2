//! # Mutex
//!
//! A recursive, owner-tracked lock with its own embedded wait-queue.
//! Acquisition installs the caller as owner with a compare-and-swap on
//! the owner field; a caller that already owns the mutex short-circuits
//! that CAS since there is nothing to install. Release rules favor
//! silent no-ops over faults: releasing a free or foreign-owned mutex
//! has no effect.
//!
//! No priority inheritance is implemented — a low-priority owner can
//! still delay a high-priority waiter. That tradeoff is accepted here,
//! not fixed.

use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::heap::{HeapKey, WaitQueue};
use crate::kernel;
use crate::tcb::TaskControlBlock;

pub struct Mutex {
    owner: AtomicPtr<TaskControlBlock>,
    count: UnsafeCell<u32>,
    waiters: UnsafeCell<WaitQueue>,
}

// `count` and `waiters` are mutated only by the current owner (for
// `count`) or under the critical section inside `kernel::wait`/`notify`
// (for `waiters`); `owner` is the sole cross-task-visible field and is
// always accessed through the atomic.
unsafe impl Sync for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            owner: AtomicPtr::new(ptr::null_mut()),
            count: UnsafeCell::new(0),
            waiters: UnsafeCell::new(WaitQueue::new(HeapKey::ByPriority)),
        }
    }

    /// Returns the current owner, or null if free.
    pub fn owner(&self) -> *mut TaskControlBlock {
        self.owner.load(Ordering::Acquire)
    }

    /// Blocks until the caller owns the mutex. A caller that already
    /// owns it acquires an additional recursion level instead of
    /// deadlocking against itself.
    pub fn acquire(&self) {
        let caller = kernel::current_tcb();
        loop {
            let owner = self.owner.load(Ordering::Acquire);
            if owner.is_null() {
                if self
                    .owner
                    .compare_exchange_weak(owner, caller, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    break;
                }
                continue;
            }
            if owner == caller {
                break;
            }
            let code = kernel::get_check_code();
            if self.owner.load(Ordering::Acquire) == owner {
                kernel::wait(unsafe { &mut *self.waiters.get() }, code);
            }
        }
        unsafe {
            *self.count.get() += 1;
        }
    }

    /// Relinquishes one level of ownership. Releasing a mutex the
    /// caller doesn't own is a silent no-op; releasing an already-free
    /// mutex resets the stale recursion counter to zero. When the
    /// counter reaches zero, the owner is cleared and the
    /// highest-priority waiter, if any, is woken.
    pub fn release(&self) {
        let caller = kernel::current_tcb();
        let owner = self.owner.load(Ordering::Acquire);
        if owner.is_null() {
            unsafe {
                *self.count.get() = 0;
            }
            return;
        }
        if owner != caller {
            return;
        }
        let remaining = unsafe {
            let c = self.count.get();
            *c -= 1;
            *c
        };
        if remaining == 0 {
            self.owner.store(ptr::null_mut(), Ordering::Release);
            kernel::notify(unsafe { &mut *self.waiters.get() });
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
