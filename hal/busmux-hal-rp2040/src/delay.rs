//! Busy-wait delay
//!
//! Recovery timing runs with the bus locked, so it spins on the time
//! driver instead of yielding to the executor.

use embassy_time::{block_for, Duration};
use embedded_hal::delay::DelayNs;

/// Spinning delay backed by `embassy_time::block_for`
#[derive(Debug, Clone, Copy, Default)]
pub struct BusyDelay;

impl DelayNs for BusyDelay {
    fn delay_ns(&mut self, ns: u32) {
        block_for(Duration::from_nanos(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(ms as u64));
    }
}
