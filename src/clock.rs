//! Time sources for measurement
//!
//! The driver only ever asks a [`Clock`] for "now" before and after a
//! measured unit, so a different source can be plugged in without touching
//! the control flow.

use std::cell::Cell;
use std::time::Instant;

/// A monotonic time source in (fractional) microseconds
pub trait Clock {
    fn now_micros(&self) -> f64;
}

/// `Instant`-backed clock, nanosecond resolution on mainstream platforms
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> f64 {
        self.origin.elapsed().as_nanos() as f64 / 1_000.0
    }
}

/// Deterministic clock that advances by a fixed step on every read.
#[derive(Debug)]
pub struct SteppingClock {
    now: Cell<f64>,
    step: f64,
}

impl SteppingClock {
    pub fn new(step_micros: f64) -> Self {
        Self {
            now: Cell::new(0.0),
            step: step_micros,
        }
    }
}

impl Clock for SteppingClock {
    fn now_micros(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_micros(&self) -> f64 {
        (**self).now_micros()
    }
}
