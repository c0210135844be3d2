//! # Critical Sections
//!
//! All scheduler and wait-queue state that isn't updated through the
//! compare-and-swap protocol in [`crate::kernel`] is mutated only
//! inside a critical section, so it can never race the tick interrupt.
//!
//! This wraps the [`critical_section`] crate rather than calling
//! `cortex_m::interrupt::free` directly: the `cortex-m` dependency
//! already registers as the `critical-section-single-core` target
//! implementation, so going through the portable crate buys host-side
//! testability (via its `std` feature) for free.

pub use critical_section::CriticalSection;

/// Runs `f` with interrupts disabled for its duration.
///
/// Keep the closure short — this is the primary source of interrupt
/// latency in the kernel.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection) -> R,
{
    critical_section::with(f)
}
