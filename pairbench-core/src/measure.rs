//! Wall-Clock Timing
//!
//! Uses `std::time::Instant`, which is monotonic and unaffected by system
//! clock adjustments. Resolution is well below a millisecond on every
//! supported platform.

use std::time::{Duration, Instant};

/// Timer bracketing one benchmark execution
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed so far
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the elapsed time
    #[inline(always)]
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }

    /// Run `f` and return its output with the time it took.
    ///
    /// The clock starts immediately before `f` is called and stops
    /// immediately after it returns; any setup must happen before this call.
    #[inline]
    pub fn time<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let timer = Self::start();
        let out = f();
        (out, timer.stop())
    }
}
