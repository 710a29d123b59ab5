//! Simulated time

use core::cell::Cell;

use embedded_hal::delay::DelayNs;

/// Monotonic clock that only moves when a [`SimDelay`] waits
#[derive(Debug, Default)]
pub struct SimClock {
    now_ns: Cell<u64>,
}

impl SimClock {
    /// Clock at t = 0
    pub const fn new() -> Self {
        Self {
            now_ns: Cell::new(0),
        }
    }

    /// Current time in nanoseconds
    pub fn now_ns(&self) -> u64 {
        self.now_ns.get()
    }

    /// Current time in microseconds
    pub fn now_us(&self) -> u64 {
        self.now_ns.get() / 1_000
    }

    /// Move time forward
    pub fn advance_ns(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get().saturating_add(ns));
    }

    /// Delay provider advancing this clock
    pub fn delay(&self) -> SimDelay<'_> {
        SimDelay { clock: self }
    }
}

/// `DelayNs` that advances a [`SimClock`] instead of sleeping
#[derive(Debug, Clone, Copy)]
pub struct SimDelay<'a> {
    clock: &'a SimClock,
}

impl DelayNs for SimDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(ns as u64);
    }
}
