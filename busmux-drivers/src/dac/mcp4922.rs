//! MCP4922 dual 12-bit DAC (SPI)
//!
//! Two chips give four outputs: channels 0/1 on DAC01, 2/3 on DAC23, odd
//! channels on output B. The analog stage after the chip maps code 0..4095
//! onto -10 V .. +10 V - 1 LSB.

use busmux_core::spi::{BusArbiter, DeviceId};
use busmux_hal::{OutputPin, SpiBus, TransactionSettings};

use crate::error::DriverError;

/// Command word bits
pub mod cmd {
    /// Output B instead of A
    pub const SELECT_B: u16 = 1 << 15;
    /// Buffered reference input
    pub const VREF_BUFFERED: u16 = 1 << 14;
    /// Gain 1x (clear for 2x)
    pub const GAIN_1X: u16 = 1 << 13;
    /// Output active (clear for shutdown)
    pub const ACTIVE: u16 = 1 << 12;
    /// Data bits
    pub const VALUE_MASK: u16 = 0x0FFF;
}

/// Bus settings (10 MHz, MSB first, mode 0)
pub const SETTINGS: TransactionSettings = TransactionSettings::preset(10_000_000);

/// Number of outputs
pub const CHANNELS: u8 = 4;

/// Highest code
pub const MAX_VALUE: u16 = 4095;

/// Voltage at code 0
pub const MIN_VOLTAGE: f32 = -10.0;

/// Voltage at [`MAX_VALUE`]
pub const MAX_VOLTAGE: f32 = -10.0 + 4095.0 * (20.0 / 4096.0);

/// Command word for `value` on `channel`'s output
pub const fn command_word(channel: u8, value: u16) -> u16 {
    let mut word = (value & cmd::VALUE_MASK) | cmd::VREF_BUFFERED | cmd::GAIN_1X | cmd::ACTIVE;
    if channel % 2 == 1 {
        word |= cmd::SELECT_B;
    }
    word
}

/// Code for `volts`, clamped to the output range
///
/// `None` for NaN.
pub fn voltage_to_code(volts: f32) -> Option<u16> {
    if volts.is_nan() {
        return None;
    }
    let volts = volts.clamp(MIN_VOLTAGE, MAX_VOLTAGE);
    let code = (volts - MIN_VOLTAGE) * (MAX_VALUE as f32) / (MAX_VOLTAGE - MIN_VOLTAGE);
    Some(((code + 0.5) as u16).min(MAX_VALUE))
}

/// Both DAC chips
#[derive(Debug, Clone, Copy)]
pub struct Mcp4922 {
    chips: [DeviceId; 2],
}

impl Mcp4922 {
    /// DAC with channels 0/1 on `dac01` and 2/3 on `dac23`
    pub const fn new(dac01: DeviceId, dac23: DeviceId) -> Self {
        Self {
            chips: [dac01, dac23],
        }
    }

    /// Slot driving `channel`
    pub fn device(&self, channel: u8) -> Option<DeviceId> {
        self.chips.get(channel as usize / 2).copied()
    }

    /// Set every output to 0 V
    pub fn init<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
    ) -> Result<(), DriverError<S::Error>> {
        arbiter.initialize()?;
        self.set_voltage_all(arbiter, 0.0)?;

        #[cfg(feature = "defmt")]
        defmt::info!("MCP4922: {} outputs at 0 V", CHANNELS);

        Ok(())
    }

    /// Write a raw 12-bit code
    pub fn write_raw<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        value: u16,
    ) -> Result<(), DriverError<S::Error>> {
        let device = self
            .device(channel)
            .ok_or(DriverError::InvalidChannel(channel))?;
        if value > MAX_VALUE {
            return Err(DriverError::OutOfRange);
        }

        arbiter.transaction(&SETTINGS, device, |txn| {
            txn.write_word(command_word(channel, value))?;
            Ok(())
        })
    }

    /// Set an output voltage, clamped to -10 V .. +10 V
    pub fn set_voltage<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        volts: f32,
    ) -> Result<(), DriverError<S::Error>> {
        let code = voltage_to_code(volts).ok_or(DriverError::OutOfRange)?;
        self.write_raw(arbiter, channel, code)
    }

    /// Set every output to the same voltage
    pub fn set_voltage_all<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        volts: f32,
    ) -> Result<(), DriverError<S::Error>> {
        for channel in 0..CHANNELS {
            self.set_voltage(arbiter, channel, volts)?;
        }
        Ok(())
    }
}

impl Default for Mcp4922 {
    fn default() -> Self {
        Self::new(DeviceId::DAC01, DeviceId::DAC23)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busmux_core::sim::{Loopback, SimSpiBoard};
    use proptest::prelude::*;

    #[test]
    fn test_command_word() {
        assert_eq!(command_word(0, 0x800), 0x7800);
        assert_eq!(command_word(1, 0x800), 0xF800);
        assert_eq!(command_word(2, 0), 0x7000);
        assert_eq!(command_word(3, 0xFFF), 0xFFFF);
    }

    #[test]
    fn test_voltage_to_code() {
        assert_eq!(voltage_to_code(-10.0), Some(0));
        assert_eq!(voltage_to_code(0.0), Some(2048));
        assert_eq!(voltage_to_code(5.0), Some(3072));
        assert_eq!(voltage_to_code(MAX_VOLTAGE), Some(4095));
        assert_eq!(voltage_to_code(-50.0), Some(0));
        assert_eq!(voltage_to_code(50.0), Some(4095));
        assert_eq!(voltage_to_code(f32::NAN), None);
    }

    #[test]
    fn test_channel_routing() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        let dac = Mcp4922::default();
        arbiter.initialize().unwrap();

        dac.write_raw(&mut arbiter, 0, 0x123).unwrap();
        dac.write_raw(&mut arbiter, 3, 0x456).unwrap();

        assert_eq!(board.sent_to(DeviceId::DAC01).as_slice(), &[0x71, 0x23]);
        assert_eq!(board.sent_to(DeviceId::DAC23).as_slice(), &[0xF4, 0x56]);
        assert_eq!(board.settings().map(|s| s.clock_hz()), Some(10_000_000));
        assert_eq!(board.current(), DeviceId::UNUSED);
    }

    #[test]
    fn test_init_zero_volts() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        let dac = Mcp4922::default();

        dac.init(&mut arbiter).unwrap();

        assert_eq!(
            board.sent_to(DeviceId::DAC01).as_slice(),
            &[0x78, 0x00, 0xF8, 0x00]
        );
        assert_eq!(
            board.sent_to(DeviceId::DAC23).as_slice(),
            &[0x78, 0x00, 0xF8, 0x00]
        );
        assert_eq!(board.unselected_bytes(), 0);
    }

    #[test]
    fn test_rejected_arguments() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        let dac = Mcp4922::default();
        arbiter.initialize().unwrap();

        assert_eq!(
            dac.write_raw(&mut arbiter, 4, 0),
            Err(DriverError::InvalidChannel(4))
        );
        assert_eq!(
            dac.write_raw(&mut arbiter, 0, 0x1000),
            Err(DriverError::OutOfRange)
        );
        assert_eq!(
            dac.set_voltage(&mut arbiter, 1, f32::NAN),
            Err(DriverError::OutOfRange)
        );
        assert!(board.transcript().is_empty());
    }

    proptest! {
        #[test]
        fn prop_code_monotonic(a in -12.0f32..12.0, b in -12.0f32..12.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo = voltage_to_code(lo).unwrap();
            let hi = voltage_to_code(hi).unwrap();
            prop_assert!(lo <= hi);
            prop_assert!(hi <= MAX_VALUE);
        }
    }
}
