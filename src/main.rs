//! # Example firmware
//!
//! Wires up an idle task, three worker tasks at different priorities,
//! and a [`Mutex`] shared between two of them, to demonstrate the
//! kernel's public API end to end. Not part of the tested contract —
//! the crate's modules are exercised by their own unit tests.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use rtos_core::kernel;
use rtos_core::mutex::Mutex;
use rtos_core::tcb::TaskControlBlock;

static SHARED: Mutex = Mutex::new();
static mut SHARED_COUNTER: u32 = 0;

static mut IDLE_TCB: TaskControlBlock = TaskControlBlock::new();
static mut IDLE_STACK: [u32; 64] = [0; 64];

static mut HIGH_TCB: TaskControlBlock = TaskControlBlock::new();
static mut HIGH_STACK: [u32; 64] = [0; 64];

static mut MID_TCB: TaskControlBlock = TaskControlBlock::new();
static mut MID_STACK: [u32; 64] = [0; 64];

static mut LOW_TCB: TaskControlBlock = TaskControlBlock::new();
static mut LOW_STACK: [u32; 64] = [0; 64];

/// Idle task: runs only when nothing else is runnable.
extern "C" fn idle_task(_arg: u32) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

/// Highest-priority task: short bursts, then sleeps.
extern "C" fn high_priority_task(_arg: u32) -> ! {
    loop {
        SHARED.acquire();
        unsafe {
            SHARED_COUNTER = SHARED_COUNTER.wrapping_add(1);
        }
        SHARED.release();
        kernel::sleep(10);
    }
}

/// Mid-priority task: also touches the shared counter, then yields.
extern "C" fn mid_priority_task(_arg: u32) -> ! {
    loop {
        SHARED.acquire();
        unsafe {
            SHARED_COUNTER = SHARED_COUNTER.wrapping_add(1);
        }
        SHARED.release();
        kernel::yield_now();
    }
}

/// Lowest-priority task: background work, preempted freely.
extern "C" fn low_priority_task(_arg: u32) -> ! {
    let mut spins: u32 = 0;
    loop {
        spins = spins.wrapping_add(1);
        if spins % 1000 == 0 {
            kernel::yield_now();
        }
    }
}

#[entry]
fn main() -> ! {
    kernel::init();

    unsafe {
        kernel::set_idle_task(
            &mut *core::ptr::addr_of_mut!(IDLE_TCB),
            &mut *core::ptr::addr_of_mut!(IDLE_STACK),
            idle_task,
        );

        kernel::create_task(
            &mut *core::ptr::addr_of_mut!(HIGH_TCB),
            &mut *core::ptr::addr_of_mut!(HIGH_STACK),
            high_priority_task,
            0,
            1,
        )
        .expect("failed to create high_priority_task");

        kernel::create_task(
            &mut *core::ptr::addr_of_mut!(MID_TCB),
            &mut *core::ptr::addr_of_mut!(MID_STACK),
            mid_priority_task,
            0,
            3,
        )
        .expect("failed to create mid_priority_task");

        kernel::create_task(
            &mut *core::ptr::addr_of_mut!(LOW_TCB),
            &mut *core::ptr::addr_of_mut!(LOW_STACK),
            low_priority_task,
            0,
            5,
        )
        .expect("failed to create low_priority_task");
    }

    let cp = cortex_m::Peripherals::take().unwrap();
    kernel::start(cp)
}
