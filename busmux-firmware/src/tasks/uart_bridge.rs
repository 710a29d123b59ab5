//! Echo service on the I2C UART bridge

use defmt::*;
use embassy_time::{Duration, Ticker};

use busmux_drivers::uart::Sc16is740;

use crate::bus::SharedI2c;

/// Poll interval in milliseconds
pub const POLL_INTERVAL_MS: u64 = 10;

/// Initialize the bridge, then echo every received byte
///
/// Exits if the I2C bus was never attached or the bridge does not answer.
#[embassy_executor::task]
pub async fn uart_bridge_task(i2c: &'static SharedI2c, uart: Sc16is740) {
    {
        let mut guard = i2c.lock().await;
        let mut session = match guard.bus() {
            Ok(session) => session,
            Err(e) => {
                warn!("UART bridge unavailable: {}", e);
                return;
            }
        };
        if let Err(e) = uart.init(&mut session) {
            warn!("UART bridge init failed: {}", e);
            return;
        }
    }
    info!("UART bridge task started");

    let mut ticker = Ticker::every(Duration::from_millis(POLL_INTERVAL_MS));
    loop {
        ticker.next().await;

        let mut guard = i2c.lock().await;
        let Ok(mut session) = guard.bus() else {
            continue;
        };
        loop {
            match uart.read_byte(&mut session) {
                Ok(Some(byte)) => {
                    if let Err(e) = uart.write_byte(&mut session, byte) {
                        warn!("UART bridge write failed: {}", e);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("UART bridge read failed: {}", e);
                    break;
                }
            }
        }
    }
}
