//! Blocking SPI master

use busmux_hal::{BitOrder, Mode, SpiBus, TransactionSettings};
use embassy_rp::spi::{self, Blocking, Config, Instance, Phase, Polarity, Spi};

/// Peripheral configuration for `settings`
///
/// Bit order is not a PL022 setting; see [`BlockingSpi`].
pub fn config_for(settings: &TransactionSettings) -> Config {
    let (polarity, phase) = match settings.mode() {
        Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
        Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
        Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
        Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
    };
    let mut config = Config::default();
    config.frequency = settings.clock_hz();
    config.polarity = polarity;
    config.phase = phase;
    config
}

/// SPI master reconfigured at the start of every transaction
///
/// The PL022 only shifts MSB first; LSB-first transfers reverse each byte
/// in software on the way in and out.
pub struct BlockingSpi<'d, T: Instance> {
    spi: Spi<'d, T, Blocking>,
    bit_order: BitOrder,
}

impl<'d, T: Instance> BlockingSpi<'d, T> {
    /// Wrap a blocking SPI peripheral
    pub fn new(spi: Spi<'d, T, Blocking>) -> Self {
        Self {
            spi,
            bit_order: BitOrder::MsbFirst,
        }
    }

    fn reverse_if_lsb(&self, data: &mut [u8]) {
        if self.bit_order == BitOrder::LsbFirst {
            for byte in data.iter_mut() {
                *byte = byte.reverse_bits();
            }
        }
    }
}

impl<T: Instance> SpiBus for BlockingSpi<'_, T> {
    type Error = spi::Error;

    fn configure(&mut self, settings: &TransactionSettings) -> Result<(), Self::Error> {
        self.spi.set_config(&config_for(settings));
        self.bit_order = settings.bit_order();
        Ok(())
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.reverse_if_lsb(data);
        self.spi.blocking_transfer_in_place(data)?;
        self.reverse_if_lsb(data);
        Ok(())
    }
}
