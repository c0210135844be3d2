//! # Inter-Task Message Queue
//!
//! A bounded mailbox addressed by destination TCB, built from a
//! [`Mutex`] guarding slot mutation and a [`Semaphore`] whose counter
//! tracks free slots. `send` and `read` both first try the semaphore's
//! cheap full/empty check to avoid contending on the mutex when the
//! queue obviously can't make progress, then fall through to the
//! semaphore's normal blocking `acquire`/`release` to do the actual
//! accounting — so a race between the pre-check and the mutex section
//! is still resolved correctly.
//!
//! Delivery is addressed, not ordered: `read` returns the first slot
//! addressed to the caller, not the oldest message in the buffer, so
//! FIFO ordering across different destinations is not preserved. This
//! mirrors the source system's own documented limitation.

use core::cell::UnsafeCell;

use crate::config::{ITC_MAX_MSG_SIZE, ITC_QUEUE_CAPACITY};
use crate::kernel;
use crate::mutex::Mutex;
use crate::semaphore::Semaphore;
use crate::tcb::TaskControlBlock;

struct Slot {
    data: [u8; ITC_MAX_MSG_SIZE],
    len: usize,
    dest: *mut TaskControlBlock,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            data: [0; ITC_MAX_MSG_SIZE],
            len: 0,
            dest: core::ptr::null_mut(),
        }
    }
}

pub struct MessageQueue<const N: usize = ITC_QUEUE_CAPACITY> {
    slots: UnsafeCell<[Slot; N]>,
    mutex: Mutex,
    free_slots: Semaphore,
}

// Slot storage is mutated only while `mutex` is held.
unsafe impl<const N: usize> Sync for MessageQueue<N> {}

impl<const N: usize> MessageQueue<N> {
    pub const fn new() -> Self {
        Self {
            slots: UnsafeCell::new([Slot::empty(); N]),
            mutex: Mutex::new(),
            free_slots: Semaphore::new(N as u32),
        }
    }

    /// Sends `payload` (truncated to [`ITC_MAX_MSG_SIZE`] bytes) to
    /// `destination`. Blocks while the queue is full.
    pub fn send(&self, payload: &[u8], destination: *mut TaskControlBlock) {
        if self.free_slots.full() {
            let code = kernel::get_check_code();
            self.free_slots.wait_on(code);
        }
        self.mutex.acquire();
        unsafe {
            let slots = &mut *self.slots.get();
            for slot in slots.iter_mut() {
                if slot.dest.is_null() {
                    let n = payload.len().min(ITC_MAX_MSG_SIZE);
                    slot.data[..n].copy_from_slice(&payload[..n]);
                    slot.len = n;
                    slot.dest = destination;
                    break;
                }
            }
        }
        self.mutex.release();
        self.free_slots.acquire();
    }

    /// Copies the next message addressed to the caller into `out`,
    /// returning the number of bytes written. Blocks while the queue
    /// holds no message for anyone.
    pub fn read(&self, out: &mut [u8]) -> usize {
        if self.free_slots.empty() {
            let code = kernel::get_check_code();
            self.free_slots.wait_on(code);
        }
        let me = kernel::current_tcb();
        self.mutex.acquire();
        let mut copied = 0;
        unsafe {
            let slots = &mut *self.slots.get();
            for slot in slots.iter_mut() {
                if slot.dest == me {
                    copied = slot.len.min(out.len());
                    out[..copied].copy_from_slice(&slot.data[..copied]);
                    slot.dest = core::ptr::null_mut();
                    slot.len = 0;
                    break;
                }
            }
        }
        self.mutex.release();
        if copied > 0 {
            self.free_slots.release();
        }
        copied
    }

    /// Non-blocking check for whether a message addressed to the
    /// caller is currently queued.
    pub fn has_message(&self) -> bool {
        let me = kernel::current_tcb();
        unsafe {
            let slots = &*self.slots.get();
            slots.iter().any(|s| s.dest == me)
        }
    }
}

// Slot is Copy only to make the fixed-size array initializer concise;
// it never leaves `MessageQueue`'s internal storage.
impl Clone for Slot {
    fn clone(&self) -> Self {
        Self {
            data: self.data,
            len: self.len,
            dest: self.dest,
        }
    }
}
impl Copy for Slot {}

unsafe impl Send for Slot {}

#[cfg(test)]
mod tests {
    use super::*;

    // One test function: `kernel`'s "current task" lives in a
    // process-wide static, which parallel #[test] threads would
    // otherwise race on.
    #[test]
    fn send_and_read_semantics_and_blocking_scenarios() {
        kernel::init();
        let queue: MessageQueue<4> = MessageQueue::new();
        let mut receiver = TaskControlBlock::new();
        let dest = &mut receiver as *mut _;

        assert!(!queue.has_message());
        queue.send(b"hello", dest);

        kernel::set_current_tcb(dest);
        assert!(queue.has_message());
        let mut buf = [0u8; 8];
        let n = queue.read(&mut buf);
        assert_eq!(&buf[..n], b"hello");
        assert!(!queue.has_message());

        let mut r1 = TaskControlBlock::new();
        let mut r2 = TaskControlBlock::new();
        let p1 = &mut r1 as *mut _;
        let p2 = &mut r2 as *mut _;

        queue.send(b"for-r1", p1);
        queue.send(b"for-r2", p2);

        kernel::set_current_tcb(p2);
        assert!(queue.has_message());
        let n = queue.read(&mut buf);
        assert_eq!(&buf[..n], b"for-r2");

        kernel::set_current_tcb(p1);
        let n = queue.read(&mut buf);
        assert_eq!(&buf[..n], b"for-r1");

        // A receiver finds a fresh queue empty and parks on the
        // free-slots wait-queue rather than spinning. A lower-priority
        // sender sleeps 3000 ticks, then sends — the cascade notify
        // inside `Semaphore::acquire` (taking the first unit from a
        // fully-free semaphore) must put the receiver back on the
        // runnable queue, and its blocked read must then complete with
        // the sent payload.
        let scheduler = unsafe { &mut *kernel::SCHEDULER_PTR };
        let mut idle = TaskControlBlock::new();
        idle.priority = 255;
        scheduler.set_idle_task(&mut idle as *mut _);

        let queue: MessageQueue<4> = MessageQueue::new();
        let mut receiver = TaskControlBlock::new();
        let mut sender = TaskControlBlock::new();
        let r = &mut receiver as *mut _;
        let s = &mut sender as *mut _;
        scheduler.admit(r, 1).unwrap();
        scheduler.admit(s, 2).unwrap();

        kernel::set_current_tcb(r);
        assert!(!queue.has_message());
        assert!(queue.free_slots.empty());
        let code = kernel::get_check_code();
        queue.free_slots.wait_on(code);
        assert_eq!(scheduler.runnable_len(), 1, "parking the receiver leaves only the sender runnable");

        scheduler.on_sleep(s, 3000);
        for _ in 0..3000 {
            scheduler.tick();
        }
        kernel::set_current_tcb(s);
        queue.send(b"test_msg", r);
        assert_eq!(scheduler.runnable_len(), 2, "the send's cascade notify put the receiver back on the runnable queue");

        kernel::set_current_tcb(r);
        let mut buf = [0u8; 16];
        let n = queue.read(&mut buf);
        assert_eq!(&buf[..n], b"test_msg");

        // Capacity-10 queue: 5 messages addressed to R1, then 15 to R2.
        // The sender runs out of room twice (after the first 10 sends,
        // and again after the next 5) and must wait for a receiver to
        // drain before it can make further progress. Every message
        // reaches its addressee; none are lost or delivered out of
        // their own per-destination order.
        let queue: MessageQueue<10> = MessageQueue::new();
        let mut sender = TaskControlBlock::new();
        let mut r1 = TaskControlBlock::new();
        let mut r2 = TaskControlBlock::new();
        let s = &mut sender as *mut _;
        let p1 = &mut r1 as *mut _;
        let p2 = &mut r2 as *mut _;
        let mut buf = [0u8; 8];

        kernel::set_current_tcb(s);
        for i in 0..5u8 {
            queue.send(&[b'a', i], p1);
        }
        for i in 0..5u8 {
            queue.send(&[b'b', i], p2);
        }
        assert!(queue.free_slots.full(), "10 slots filled by 5 R1 + 5 R2 sends");

        // Nothing frees a slot until a receiver reads, so the sender's
        // 11th send has nowhere to go; it parks instead of spinning.
        let code = kernel::get_check_code();
        queue.free_slots.wait_on(code);

        kernel::set_current_tcb(p1);
        for i in 0..5u8 {
            let n = queue.read(&mut buf);
            assert_eq!(&buf[..n], &[b'a', i]);
        }
        assert!(!queue.free_slots.full());

        kernel::set_current_tcb(s);
        for i in 5..10u8 {
            queue.send(&[b'b', i], p2);
        }
        assert!(queue.free_slots.full());

        let code = kernel::get_check_code();
        queue.free_slots.wait_on(code);

        kernel::set_current_tcb(p2);
        for i in 0..5u8 {
            let n = queue.read(&mut buf);
            assert_eq!(&buf[..n], &[b'b', i]);
        }
        assert!(!queue.free_slots.full());

        kernel::set_current_tcb(s);
        for i in 10..15u8 {
            queue.send(&[b'b', i], p2);
        }
        assert!(queue.free_slots.full());

        kernel::set_current_tcb(p2);
        for i in 5..15u8 {
            let n = queue.read(&mut buf);
            assert_eq!(&buf[..n], &[b'b', i]);
        }
        assert!(!queue.has_message());
    }
}
