//! ADC sweep and front-panel buttons

use defmt::*;
use embassy_time::{Duration, Ticker};

use busmux_drivers::adc::Mcp3208;

use crate::bus::SharedSpi;
use crate::channels::{AnalogSample, ANALOG};

/// Sweep interval in milliseconds
pub const SWEEP_INTERVAL_MS: u64 = 100;

const CHANNELS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

#[embassy_executor::task]
pub async fn analog_task(spi: &'static SharedSpi, adc: Mcp3208) {
    info!("Analog task started");

    let mut ticker = Ticker::every(Duration::from_millis(SWEEP_INTERVAL_MS));
    let mut last_buttons = [false; 2];

    loop {
        ticker.next().await;

        let mut sample = AnalogSample::default();
        {
            let mut guard = spi.lock().await;
            let arbiter = &mut *guard;
            if let Err(e) = adc.read_raw_multiple(arbiter, &CHANNELS, &mut sample.raw) {
                warn!("ADC sweep failed: {}", e);
                continue;
            }
            for (button, pressed) in (1u8..).zip(sample.buttons.iter_mut()) {
                *pressed = adc.is_button_pressed(arbiter, button).unwrap_or(false);
            }
        }

        for (i, (&now, before)) in sample.buttons.iter().zip(last_buttons.iter_mut()).enumerate() {
            if now != *before {
                info!("Button {} {}", i + 1, if now { "pressed" } else { "released" });
                *before = now;
            }
        }

        ANALOG.signal(sample);
    }
}
