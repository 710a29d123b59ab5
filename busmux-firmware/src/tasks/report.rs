//! Periodic status log

use defmt::*;
use embassy_time::{Duration, Ticker};

use busmux_drivers::adc::mcp3208::raw_to_voltage;

use crate::channels::{ANALOG, COUNTS};

/// Report interval in milliseconds
pub const REPORT_INTERVAL_MS: u64 = 1000;

#[embassy_executor::task]
pub async fn report_task() {
    let mut ticker = Ticker::every(Duration::from_millis(REPORT_INTERVAL_MS));
    loop {
        ticker.next().await;

        if let Some([qc0, qc1]) = COUNTS.try_take() {
            info!("Counts: QC0={} QC1={}", qc0, qc1);
        }
        if let Some(sample) = ANALOG.try_take() {
            let mut volts = [0.0f32; 8];
            for (channel, (v, &raw)) in (0u8..).zip(volts.iter_mut().zip(sample.raw.iter())) {
                *v = raw_to_voltage(raw, channel);
            }
            info!("Analog: {} V", volts);
        }
    }
}
