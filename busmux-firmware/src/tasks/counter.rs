//! Quadrature counter sampling

use defmt::*;
use embassy_time::{Duration, Ticker};

use busmux_drivers::counter::Ls7366r;

use crate::bus::SharedSpi;
use crate::channels::COUNTS;

/// Sampling interval in milliseconds
pub const SAMPLE_INTERVAL_MS: u64 = 10;

/// Enable both counters, then publish their counts every interval
///
/// An index pulse is logged and its latch cleared.
#[embassy_executor::task]
pub async fn counter_task(spi: &'static SharedSpi, counter: Ls7366r) {
    info!("Counter task started");

    {
        let mut guard = spi.lock().await;
        let arbiter = &mut *guard;
        for channel in 0..=counter.max_channel() {
            if let Err(e) = counter.enable_counter(arbiter, channel) {
                warn!("Counter {} enable failed: {}", channel, e);
            }
        }
    }

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_INTERVAL_MS));
    let mut counts = [0i32; 2];

    loop {
        ticker.next().await;

        {
            let mut guard = spi.lock().await;
            let arbiter = &mut *guard;
            for (channel, count) in (0u8..).zip(counts.iter_mut()) {
                match counter.read_count(arbiter, channel) {
                    Ok(value) => *count = value,
                    Err(e) => warn!("Counter {} read failed: {}", channel, e),
                }
                if let Ok(true) = counter.is_index_set(arbiter, channel) {
                    debug!("Counter {} passed index", channel);
                    if let Err(e) = counter.clear_status(arbiter, channel) {
                        warn!("Counter {} status clear failed: {}", channel, e);
                    }
                }
            }
        }

        COUNTS.signal(counts);
    }
}
