//! # Kernel Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time — no dynamic allocation.

/// Maximum number of tasks the system can admit, including the idle task.
/// Bounds every priority heap's backing array.
pub const MAX_TASKS: usize = 16;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Lowest legal task priority value (numerically largest = least urgent).
pub const MIN_PRIORITY: u8 = 5;

/// Highest legal task priority value (numerically smallest = most urgent).
pub const MAX_PRIORITY: u8 = 1;

/// Capacity of a mutex's or semaphore's internal wait-queue.
/// Bounded by `MAX_TASKS` since a task can wait on at most one object.
pub const MAX_WAITERS: usize = MAX_TASKS;

/// Default number of slots in an inter-task message queue.
pub const ITC_QUEUE_CAPACITY: usize = 10;

/// Maximum payload size, in bytes, carried by a single message-queue slot.
pub const ITC_MAX_MSG_SIZE: usize = 16;
