//! Adapters from `embedded-hal` 1.0 types to the busmux traits
//!
//! Lets any HAL that already implements `embedded-hal` drive the bus core
//! without a dedicated board crate. GPIO adapters require infallible pins,
//! which is what every common MCU HAL provides.

use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::{InputPin as EhInputPin, OutputPin as EhOutputPin};
use embedded_hal::i2c::I2c as EhI2c;
use embedded_hal::spi::SpiBus as EhSpiBus;

use crate::gpio::{LineMode, OpenDrainPin, OutputPin};
use crate::i2c::I2cBus;
use crate::spi::{SpiBus, TransactionSettings};

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(v) => v,
        Err(never) => match never {},
    }
}

/// Push-pull output wrapper
///
/// Tracks the last written level so `is_set_high` doesn't need `&mut`.
pub struct EhOutput<P> {
    pin: P,
    high: bool,
}

impl<P: EhOutputPin<Error = Infallible>> EhOutput<P> {
    /// Wrap a pin and drive it to `initial_high`
    pub fn new(mut pin: P, initial_high: bool) -> Self {
        if initial_high {
            infallible(pin.set_high());
        } else {
            infallible(pin.set_low());
        }
        Self {
            pin,
            high: initial_high,
        }
    }

    /// Release the wrapped pin
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: EhOutputPin<Error = Infallible>> OutputPin for EhOutput<P> {
    fn set_high(&mut self) {
        infallible(self.pin.set_high());
        self.high = true;
    }

    fn set_low(&mut self) {
        infallible(self.pin.set_low());
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// Open-drain wrapper for a pin the HAL already configured as open-drain
/// output with pull-up
///
/// On such a pin `set_high` releases the wire, so [`LineMode::Released`] maps
/// to it and the wire is still never actively driven high.
pub struct EhOpenDrain<P> {
    pin: RefCell<P>,
}

impl<P> EhOpenDrain<P>
where
    P: EhOutputPin<Error = Infallible> + EhInputPin<Error = Infallible>,
{
    /// Wrap a pin and release it
    pub fn new(pin: P) -> Self {
        let mut line = Self {
            pin: RefCell::new(pin),
        };
        line.release();
        line
    }

    /// Release the wrapped pin
    pub fn free(self) -> P {
        self.pin.into_inner()
    }
}

impl<P> OpenDrainPin for EhOpenDrain<P>
where
    P: EhOutputPin<Error = Infallible> + EhInputPin<Error = Infallible>,
{
    fn set_mode(&mut self, mode: LineMode) {
        let pin = self.pin.get_mut();
        match mode {
            LineMode::Released => infallible(pin.set_high()),
            LineMode::DrivenLow => infallible(pin.set_low()),
        }
    }

    fn is_high(&self) -> bool {
        infallible(self.pin.borrow_mut().is_high())
    }
}

/// SPI bus wrapper
///
/// `embedded-hal` has no runtime reconfiguration, so the clock rate and mode
/// are whatever the bus was built with; `configure` only flushes pending
/// writes so a new transaction starts on an idle bus.
pub struct EhSpi<S> {
    bus: S,
}

impl<S: EhSpiBus<u8>> EhSpi<S> {
    /// Wrap a configured bus
    pub fn new(bus: S) -> Self {
        Self { bus }
    }

    /// Release the wrapped bus
    pub fn free(self) -> S {
        self.bus
    }
}

impl<S: EhSpiBus<u8>> SpiBus for EhSpi<S> {
    type Error = S::Error;

    fn configure(&mut self, _settings: &TransactionSettings) -> Result<(), Self::Error> {
        self.bus.flush()
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.transfer_in_place(data)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.bus.transfer(read, write)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.read(buf)
    }
}

/// I2C bus wrapper
pub struct EhI2cBus<I> {
    bus: I,
}

impl<I: EhI2c> EhI2cBus<I> {
    /// Wrap a configured bus
    pub fn new(bus: I) -> Self {
        Self { bus }
    }

    /// Release the wrapped bus
    pub fn free(self) -> I {
        self.bus
    }
}

impl<I: EhI2c> I2cBus for EhI2cBus<I> {
    type Error = I::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.read(address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.write_read(address, write_data, read_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::ErrorType;

    /// Open-drain pin model: the wire is low if we drive it or a slave holds it
    struct MockOdPin {
        driven_low: bool,
        slave_holds_low: bool,
        writes_high: u32,
    }

    impl ErrorType for MockOdPin {
        type Error = Infallible;
    }

    impl EhOutputPin for MockOdPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.driven_low = true;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.driven_low = false;
            self.writes_high += 1;
            Ok(())
        }
    }

    impl EhInputPin for MockOdPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(!self.driven_low && !self.slave_holds_low)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.driven_low || self.slave_holds_low)
        }
    }

    #[test]
    fn test_open_drain_modes() {
        let pin = MockOdPin {
            driven_low: true,
            slave_holds_low: false,
            writes_high: 0,
        };
        let mut line = EhOpenDrain::new(pin);

        // Construction releases the line
        assert!(line.is_high());

        line.pull_low();
        assert!(line.is_low());

        line.release();
        assert!(line.is_high());

        let pin = line.free();
        assert_eq!(pin.writes_high, 2);
    }

    #[test]
    fn test_open_drain_sees_slave() {
        let pin = MockOdPin {
            driven_low: false,
            slave_holds_low: true,
            writes_high: 0,
        };
        let mut line = EhOpenDrain::new(pin);
        line.release();
        assert!(line.is_low());
    }

    struct MockOut {
        high: bool,
    }

    impl ErrorType for MockOut {
        type Error = Infallible;
    }

    impl EhOutputPin for MockOut {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    #[test]
    fn test_output_tracks_level() {
        let mut out = EhOutput::new(MockOut { high: false }, true);
        assert!(out.is_set_high());
        out.set_state(false);
        assert!(out.is_set_low());
        assert!(!out.free().high);
    }
}
