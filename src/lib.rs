//! # A preemptive, fixed-priority RTOS kernel core
//!
//! Scheduler, wait/notify engine, and the synchronization primitives
//! built on top of it, for single-core ARM Cortex-M4 targets.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · create_task() · start() · wait() · notify()  │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │  Sync Primitives   │   ITC / Pool      │
//! │  scheduler.rs│  mutex.rs          │   queue.rs        │
//! │  ─ admit()   │  semaphore.rs      │   pool.rs         │
//! │  ─ pick_next │  sync.rs           │                   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │           Task Model (tcb.rs) · Priority Heap (heap.rs) │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · Context Switch · Stack Init      │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling model
//!
//! Strict fixed-priority preemption: the highest-priority runnable task
//! always runs. Tasks of equal priority do not round-robin against each
//! other — admission order decides ties, since the priority heap is not
//! stable beyond that. A single idle task, registered once via
//! [`kernel::set_idle_task`], runs when nothing else is runnable and is
//! never itself preemptible by anything but a real task becoming
//! runnable.
//!
//! ## Wait/notify and the check-code protocol
//!
//! Every blocking primitive in this crate ([`mutex::Mutex`],
//! [`semaphore::Semaphore`], [`queue::MessageQueue`],
//! [`pool::MemoryPool`]) is built from the same two kernel primitives,
//! [`kernel::wait`] and [`kernel::notify`]. The protocol exists to close
//! a specific race: a task samples a condition, decides to block, and
//! is preempted before it finishes suspending itself — during which
//! another task changes the condition and calls `notify`, finding the
//! wait-queue still empty. Without a fix, that wakeup is lost and the
//! waiter sleeps forever.
//!
//! The fix is a monotonic `CHECK_CODE` counter bumped by every
//! `notify`. A caller samples it with [`kernel::get_check_code`] *before*
//! evaluating its wait condition, and passes that sample into `wait`,
//! which bails out without blocking if the counter has already moved —
//! the caller is expected to re-check its condition itself in that case.
//!
//! ## Memory model
//!
//! - **No heap, no `alloc`**: every structure is either fixed-capacity
//!   or built over caller-provided `'static` storage (task stacks,
//!   message queue payload slots, memory pool backing arrays).
//! - **Critical sections**: short, bounded regions guarded by
//!   [`sync::critical_section`], a thin wrapper over the `critical-section`
//!   crate so the same code is usable from host tests and from real
//!   hardware.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod heap;
pub mod kernel;
pub mod mutex;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod semaphore;
pub mod sync;
pub mod tcb;
