// Wall-clock sources for the capture loop
//
// The pacing engine only ever sees seconds as `f64`. Hosts that already keep
// a per-frame time (game time, render time) pass it straight through; the
// clocks here are for hosts that don't, and for driving tests.

use std::time::Instant;

use parking_lot::Mutex;

/// A source of wall-clock time in seconds
pub trait Clock {
    /// Seconds since an arbitrary, fixed origin
    fn now(&self) -> f64;
}

/// Monotonic clock backed by `Instant`, zeroed at construction
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to
///
/// Useful for offline rendering where frames are produced faster than real
/// time, and for deterministic tests of the pacing engine.
pub struct ManualClock {
    time: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            time: Mutex::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, seconds: f64) {
        *self.time.lock() = seconds;
    }

    /// Move forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        *self.time.lock() += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.time.lock()
    }
}
