//! Inter-task signals
//!
//! Sampling tasks publish their latest reading; the report task picks up
//! whatever is newest.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// One ADC sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalogSample {
    /// Raw codes, channel 0 first
    pub raw: [u16; 8],
    /// Front-panel buttons 1 and 2
    pub buttons: [bool; 2],
}

/// Latest quadrature counts (QC0, QC1)
pub static COUNTS: Signal<CriticalSectionRawMutex, [i32; 2]> = Signal::new();

/// Latest ADC sweep
pub static ANALOG: Signal<CriticalSectionRawMutex, AnalogSample> = Signal::new();
