//! # Counting Semaphore
//!
//! `counter` represents resources currently available, bounded by
//! `capacity`. Naming is symmetric: [`Semaphore::full`] means no
//! resources remain to acquire; [`Semaphore::empty`] means the counter
//! is back at capacity (nobody currently holds a unit).
//!
//! `acquire` re-samples the check-code immediately before every
//! `wait` call, not once before the retry loop — a stale sample taken
//! before the loop can survive a spurious wake and turn a blocking
//! wait into a busy-poll. [`Semaphore::wait_on`]/[`Semaphore::notify_on`]
//! expose the internal wait-queue directly for higher-level primitives
//! (the message queue and memory pool) that need to pre-check before
//! contending on the counter itself.

use core::sync::atomic::{AtomicU32, Ordering};
use core::cell::UnsafeCell;

use crate::heap::{HeapKey, WaitQueue};
use crate::kernel;

pub struct Semaphore {
    counter: AtomicU32,
    capacity: u32,
    waiters: UnsafeCell<WaitQueue>,
}

unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const fn new(capacity: u32) -> Self {
        Self {
            counter: AtomicU32::new(capacity),
            capacity,
            waiters: UnsafeCell::new(WaitQueue::new(HeapKey::ByPriority)),
        }
    }

    pub fn count(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    /// No resources remain to acquire.
    pub fn full(&self) -> bool {
        self.count() == 0
    }

    /// The counter is back at full capacity.
    pub fn empty(&self) -> bool {
        self.count() == self.capacity
    }

    /// Blocks until a resource unit is available, then takes it.
    pub fn acquire(&self) {
        loop {
            let code = kernel::get_check_code();
            let cur = self.counter.load(Ordering::Acquire);
            if cur == 0 {
                kernel::wait(unsafe { &mut *self.waiters.get() }, code);
                continue;
            }
            if self
                .counter
                .compare_exchange_weak(cur, cur - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if cur == self.capacity {
                    // We just took the first unit from an otherwise
                    // fully-available semaphore; cascade a notify in
                    // case another task raced us here and is already
                    // parked on the wait-queue from a prior contended
                    // attempt.
                    kernel::notify(unsafe { &mut *self.waiters.get() });
                }
                return;
            }
        }
    }

    /// Returns one resource unit. Over-release past `capacity` is a
    /// silent no-op.
    pub fn release(&self) {
        loop {
            let cur = self.counter.load(Ordering::Acquire);
            if cur == self.capacity {
                return;
            }
            if self
                .counter
                .compare_exchange_weak(cur, cur + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if cur == 0 {
                    kernel::notify(unsafe { &mut *self.waiters.get() });
                }
                return;
            }
        }
    }

    /// Suspends the caller on this semaphore's wait-queue directly,
    /// without touching the counter. Used by callers that have already
    /// made their own full/empty decision.
    pub fn wait_on(&self, sampled_check_code: u32) {
        kernel::wait(unsafe { &mut *self.waiters.get() }, sampled_check_code);
    }

    /// Wakes the highest-priority waiter on this semaphore's
    /// wait-queue, without touching the counter.
    pub fn notify_on(&self) {
        kernel::notify(unsafe { &mut *self.waiters.get() });
    }
}
