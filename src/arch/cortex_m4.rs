//! # Cortex-M4 Port
//!
//! The only place in the kernel that touches processor registers
//! directly. Owns stack-frame construction, SysTick configuration, and
//! the PendSV context-switch trampoline.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): used by the kernel and interrupt handlers
//! - **PSP** (Process Stack Pointer): used by tasks in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0–R3, R12,
//! LR, PC, and xPSR onto the process stack. The PendSV handler saves
//! and restores R4–R11 by hand, completing the full context save/restore.
//!
//! ## Interrupt Priorities
//!
//! SysTick and PendSV are both set to the lowest priority so that a
//! context switch is never mid-flight while a higher-priority
//! interrupt handler still needs to run.

#[cfg(target_arch = "arm")]
use core::arch::asm;

#[cfg(target_arch = "arm")]
use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::tcb::TaskControlBlock;

// ---------------------------------------------------------------------------
// Stack frame construction
// ---------------------------------------------------------------------------

/// Number of 32-bit words in a full saved context: R4–R11 (software)
/// plus R0–R3, R12, LR, PC, xPSR (hardware).
const FRAME_WORDS: usize = 16;

/// Lays out the initial stack frame for `tcb` so that the first PendSV
/// "return" begins executing `entry(arg)`, and so that a task entry
/// function which returns instead of looping traps into
/// [`crate::kernel::exit_current_task`].
///
/// `stack` must hold at least [`FRAME_WORDS`] words; the frame is
/// placed at its top, 8-byte aligned as AAPCS requires.
pub fn init_task_stack(
    tcb: &mut TaskControlBlock,
    stack: &mut [u32],
    entry: extern "C" fn(u32) -> !,
    arg: u32,
) {
    assert!(stack.len() >= FRAME_WORDS);
    let top = stack.as_mut_ptr_range().end as usize;
    let aligned_top = top & !0x7;
    let frame = (aligned_top - FRAME_WORDS * 4) as *mut u32;

    unsafe {
        // Software-saved R4–R11, bottom of the frame.
        for i in 0..8 {
            *frame.add(i) = 0;
        }
        // Hardware-stacked frame.
        *frame.add(8) = arg; // R0: task argument
        *frame.add(9) = 0; // R1
        *frame.add(10) = 0; // R2
        *frame.add(11) = 0; // R3
        *frame.add(12) = 0; // R12
        *frame.add(13) = task_exit_trampoline as u32; // LR: return address if task returns
        *frame.add(14) = entry as u32; // PC: task entry point
        *frame.add(15) = 0x0100_0000; // xPSR: Thumb bit set
    }

    tcb.sp = frame;
}

extern "C" fn task_exit_trampoline() -> ! {
    crate::kernel::exit_current_task();
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configures SysTick to fire at [`TICK_HZ`] using the processor clock.
#[cfg(target_arch = "arm")]
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    use cortex_m::peripheral::syst::SystClkSource;
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger and interrupt priorities
// ---------------------------------------------------------------------------

/// Sets the PENDSVSET bit in the Interrupt Control and State Register,
/// requesting a context switch at the next opportunity.
#[cfg(target_arch = "arm")]
#[inline]
pub fn trigger_pendsv() {
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

/// Host stand-in: there is no NVIC to poke. The portable kernel core
/// calls this unconditionally from `wait`/`notify`/`yield_now`, so it
/// must exist off-target, but off-target there is also no PendSV
/// handler to ever act on it.
#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn trigger_pendsv() {}

/// Sets PendSV and SysTick to the lowest interrupt priority so a
/// context switch never preempts an application ISR.
#[cfg(target_arch = "arm")]
pub fn set_interrupt_priorities() {
    unsafe {
        const SHPR3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(SHPR3);
        core::ptr::write_volatile(SHPR3, val | (0xFF << 16) | (0xFF << 24));
    }
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Switches to PSP and branches into the first task's entry point.
/// Called once from `kernel::start` and never returns.
///
/// # Safety
/// Must be called exactly once, with a stack pointer produced by
/// [`init_task_stack`].
#[cfg(target_arch = "arm")]
pub unsafe fn start_first_task(psp: *mut u32) -> ! {
    asm!(
        "adds r0, #32",      // skip the 8 software-saved registers
        "msr psp, r0",
        "movs r0, #2",       // CONTROL.SPSEL = 1: use PSP in Thread mode
        "msr control, r0",
        "isb",
        "pop {{r0-r3, r12}}",
        "pop {{r4}}",        // LR — discarded, task entry is noreturn
        "pop {{r5}}",        // PC — task entry point
        "pop {{r6}}",        // xPSR — discarded, set by the processor
        "cpsie i",
        "bx r5",
        in("r0") psp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler
// ---------------------------------------------------------------------------

/// PendSV exception handler. Saves R4–R11 onto the outgoing task's
/// stack, asks the scheduler for the next TCB, and restores R4–R11
/// from the incoming task's stack before returning.
///
/// # Safety
/// Naked function invoked directly by the NVIC; must follow the exact
/// Cortex-M4 exception entry/exit convention.
#[cfg(target_arch = "arm")]
#[no_mangle]
#[naked]
pub unsafe extern "C" fn PendSV() {
    asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {save_context}",
        "bl {do_schedule}",
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",
        "bx r0",
        save_context = sym save_current_context,
        do_schedule = sym do_context_switch,
        options(noreturn)
    );
}

/// Records the outgoing task's saved stack pointer. Called from PendSV.
#[cfg(target_arch = "arm")]
#[no_mangle]
unsafe extern "C" fn save_current_context(psp: *mut u32) {
    let cur = crate::kernel::current_tcb();
    if !cur.is_null() {
        (*cur).sp = psp;
    }
}

/// Asks the scheduler for the next task and returns its saved stack
/// pointer. Called from PendSV.
#[cfg(target_arch = "arm")]
#[no_mangle]
unsafe extern "C" fn do_context_switch() -> *mut u32 {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    let next = scheduler.pick_next();
    crate::kernel::set_current_tcb(next);
    (*next).sp
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler. Advances the kernel's tick counter and
/// requests a context switch if that woke a sleeper.
#[cfg(target_arch = "arm")]
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    if scheduler.tick() {
        trigger_pendsv();
    }
}
