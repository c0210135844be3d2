//! # Kernel
//!
//! Top-level initialization and the public task-facing API. Owns the
//! three pieces of process-wide global state: the scheduler instance,
//! the pointer to the currently-executing TCB, and the monotonic
//! check-code used by the wait/notify engine.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()
//!         ├─► kernel::set_idle_task() ← exactly once
//!         ├─► kernel::create_task()   ← ×N, before start()
//!         └─► kernel::start()         ← launches the scheduler, never returns
//! ```
//!
//! ## The wait/notify engine
//!
//! [`wait`] and [`notify`] implement the check-code protocol described
//! in the crate-level docs: `notify` bumps [`CHECK_CODE`] before moving
//! a waiter; `wait` samples it beforehand and backs out without
//! blocking if it has already moved. The state transition itself is
//! guarded by a compare-and-swap loop on [`CURRENT`] — the portable
//! lowering of a load-linked/store-conditional pair, since
//! [`AtomicPtr::compare_exchange_weak`] is permitted to fail spuriously
//! exactly when an interrupt intervenes between the load and the swap.

use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::arch::cortex_m4;
use crate::heap::WaitQueue;
use crate::scheduler::{AdmitError, Scheduler};
use crate::sync::critical_section;
use crate::tcb::{TaskControlBlock, TaskState};

/// Global scheduler instance.
///
/// # Safety
/// Accessed via [`SCHEDULER_PTR`], set once by [`init`]. All access is
/// through a critical section or from the PendSV/SysTick handlers,
/// which are themselves serialized by the NVIC.
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the global scheduler, used by `arch::cortex_m4` which
/// cannot cheaply thread a reference through a naked function.
#[no_mangle]
pub static mut SCHEDULER_PTR: *mut Scheduler = ptr::null_mut();

/// The TCB of the task currently executing (or, during a context
/// switch, the task that was executing up to that point).
static CURRENT: AtomicPtr<TaskControlBlock> = AtomicPtr::new(ptr::null_mut());

/// Monotonic counter incremented by every [`notify`]. See the module
/// docs for how [`wait`] uses it to avoid lost wakeups.
static CHECK_CODE: AtomicU32 = AtomicU32::new(0);

/// Initializes the kernel. Must be called exactly once, before any
/// other kernel function, from the main thread.
pub fn init() {
    unsafe {
        SCHEDULER = Scheduler::new();
        SCHEDULER_PTR = ptr::addr_of_mut!(SCHEDULER);
    }
}

/// Registers the task that runs when nothing else is runnable. Must be
/// called exactly once, after [`init`] and before [`start`].
pub fn set_idle_task(tcb: &'static mut TaskControlBlock, stack: &'static mut [u32], entry: extern "C" fn(u32) -> !) {
    cortex_m4::init_task_stack(tcb, stack, entry, 0);
    critical_section(|_cs| unsafe {
        (*SCHEDULER_PTR).set_idle_task(tcb as *mut _);
    });
}

/// Initializes `tcb`'s stack frame and admits it to the scheduler at
/// `priority`. `stack` must be at least large enough for the deepest
/// call chain of `entry` plus the saved register frame.
pub fn create_task(
    tcb: &'static mut TaskControlBlock,
    stack: &'static mut [u32],
    entry: extern "C" fn(u32) -> !,
    arg: u32,
    priority: u8,
) -> Result<(), AdmitError> {
    cortex_m4::init_task_stack(tcb, stack, entry, arg);
    critical_section(|_cs| unsafe { (*SCHEDULER_PTR).admit(tcb as *mut _, priority) })
}

/// Starts the scheduler. Configures SysTick, sets interrupt priorities,
/// and launches the first task. Never returns.
///
/// # Safety
/// [`init`], [`set_idle_task`], and at least one [`create_task`] call
/// must have already happened, and this must run from the main thread.
#[cfg(target_arch = "arm")]
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities();

    let first = critical_section(|_cs| unsafe { (*SCHEDULER_PTR).pick_next() });
    CURRENT.store(first, Ordering::Release);
    let first_sp = unsafe { (*first).sp };

    unsafe {
        cortex_m4::start_first_task(first_sp);
    }
}

/// Returns the TCB of the task calling this function.
#[inline]
pub fn current_tcb() -> *mut TaskControlBlock {
    CURRENT.load(Ordering::Acquire)
}

/// Sets the currently-executing TCB. Called only by the PendSV
/// trampoline after it has committed to a context switch.
pub(crate) fn set_current_tcb(tcb: *mut TaskControlBlock) {
    CURRENT.store(tcb, Ordering::Release);
}

/// Ticks elapsed since [`start`]. Wraps at `u32::MAX`.
pub fn elapsed_ticks() -> u32 {
    critical_section(|_cs| unsafe { (*SCHEDULER_PTR).elapsed_ticks() })
}

/// Samples the check-code. Callers of [`wait`] must take this sample
/// *before* evaluating the condition that decides whether to block.
#[inline]
pub fn get_check_code() -> u32 {
    CHECK_CODE.load(Ordering::Acquire)
}

/// Voluntarily relinquishes the CPU. The scheduler may immediately
/// re-select the caller if it remains the highest-priority runnable
/// task.
pub fn yield_now() {
    let cur = current_tcb();
    critical_section(|_cs| unsafe {
        (*cur).state.insert(TaskState::YIELD);
    });
    cortex_m4::trigger_pendsv();
}

/// Suspends the caller for at least `ticks` timer ticks.
pub fn sleep(ticks: u32) {
    let cur = current_tcb();
    critical_section(|_cs| unsafe {
        (*SCHEDULER_PTR).on_sleep(cur, ticks);
    });
    cortex_m4::trigger_pendsv();
}

/// Called when the current task function returns instead of looping
/// forever. Removes it from scheduling and requests a reschedule; its
/// storage is caller-owned and is not reclaimed.
pub(crate) fn exit_current_task() -> ! {
    let cur = current_tcb();
    critical_section(|_cs| unsafe {
        (*SCHEDULER_PTR).on_exit(cur);
    });
    cortex_m4::trigger_pendsv();
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
    }
}

/// Suspends the caller on `queue` unless a [`notify`] has already been
/// observed to happen since `sampled_check_code` was taken — in which
/// case this returns immediately without blocking, since the caller's
/// own re-check of its wait condition is responsible for seeing that
/// notification.
///
/// `sampled_check_code` must have been read by [`get_check_code`]
/// immediately before the caller evaluated the condition that led it
/// to decide to wait.
pub fn wait(queue: &mut WaitQueue, sampled_check_code: u32) {
    loop {
        let cur = CURRENT.load(Ordering::Acquire);
        if sampled_check_code != CHECK_CODE.load(Ordering::Acquire) {
            // A notify already happened after the caller's sample; the
            // caller's condition re-check will observe it. Don't block.
            return;
        }
        unsafe {
            (*cur).state.insert(TaskState::WAIT);
        }
        if CURRENT
            .compare_exchange_weak(cur, cur, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            critical_section(|_cs| unsafe {
                (*SCHEDULER_PTR).on_wait(queue, cur);
            });
            cortex_m4::trigger_pendsv();
            return;
        }
        // An interrupt intervened between the load and the swap —
        // back out the speculative state change and retry from the top.
        unsafe {
            (*cur).state.remove(TaskState::WAIT);
        }
    }
}

/// Wakes the highest-priority waiter on `queue`, if any, and bumps the
/// check-code so that any in-flight [`wait`] sampled before this call
/// observes it.
pub fn notify(queue: &mut WaitQueue) {
    CHECK_CODE.fetch_add(1, Ordering::AcqRel);
    let woke = critical_section(|_cs| unsafe { (*SCHEDULER_PTR).on_notify(queue) });
    if woke.is_some() {
        cortex_m4::trigger_pendsv();
    }
}
