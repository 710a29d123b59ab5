//! MCP3208 8-channel 12-bit ADC (SPI)
//!
//! Each sample is a three-byte exchange with chip select toggled around it:
//!
//! ```text
//! MOSI: 0 0 0 0 0 S G D2 | D1 D0 x x x x x x | x x x x x x x x
//! MISO: ? ? ? ? ? ? ? ?  | ? ? ? 0 B11..B8  | B7 .. B0
//! ```
//!
//! Inputs 0..3 are scaled to -10 V .. +10 V, inputs 4..7 to 0 .. 2.5 V.
//! The two front-panel buttons pull inputs 6 and 7 low when pressed.

use busmux_core::spi::{BusArbiter, DeviceId, Transaction};
use busmux_hal::{OutputPin, SpiBus, TransactionSettings};

use crate::error::DriverError;

/// Bus settings (2 MHz, MSB first, mode 0)
pub const SETTINGS: TransactionSettings = TransactionSettings::preset(2_000_000);

/// Number of inputs
pub const CHANNELS: u8 = 8;

/// Highest code
pub const MAX_VALUE: u16 = 4095;

/// Start bit
const START: u16 = 0x0400;
/// Single-ended conversion
const SINGLE_ENDED: u16 = 0x0200;

/// Input range of channels 0..3
pub const BIPOLAR_RANGE: (f32, f32) = (-10.0, -10.0 + 4095.0 * (20.0 / 4096.0));

/// Input range of channels 4..7
pub const UNIPOLAR_RANGE: (f32, f32) = (0.0, 4095.0 * (2.5 / 4096.0));

/// Command word for a single-ended conversion on `channel`
pub const fn command_word(channel: u8) -> u16 {
    START | SINGLE_ENDED | ((channel as u16 & 0x07) << 6)
}

/// Convert a code to volts using the input scaling of `channel`
pub fn raw_to_voltage(raw: u16, channel: u8) -> f32 {
    let (min, max) = if channel < 4 {
        BIPOLAR_RANGE
    } else {
        UNIPOLAR_RANGE
    };
    min + (raw.min(MAX_VALUE) as f32) * (max - min) / (MAX_VALUE as f32)
}

/// The ADC chip
#[derive(Debug, Clone, Copy)]
pub struct Mcp3208 {
    device: DeviceId,
}

impl Mcp3208 {
    /// ADC at decoder slot `device`
    pub const fn new(device: DeviceId) -> Self {
        Self { device }
    }

    /// Read one input, averaging `average` samples (0 counts as 1)
    pub fn read_raw<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        average: u8,
    ) -> Result<u16, DriverError<S::Error>> {
        check_channel(channel)?;
        let count = average.max(1) as u32;

        arbiter.transaction(&SETTINGS, self.device, |txn| {
            let mut sum = 0u32;
            for i in 0..count {
                if i > 0 {
                    txn.deselect();
                    txn.select(self.device);
                }
                sum += sample(txn, channel)? as u32;
            }
            Ok((sum / count) as u16)
        })
    }

    /// Read several inputs in one transaction
    ///
    /// `values[i]` receives the code of `channels[i]`; extra entries on
    /// either side are ignored.
    pub fn read_raw_multiple<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channels: &[u8],
        values: &mut [u16],
    ) -> Result<(), DriverError<S::Error>> {
        if let Some(&bad) = channels.iter().find(|&&ch| ch >= CHANNELS) {
            return Err(DriverError::InvalidChannel(bad));
        }

        arbiter.transaction(&SETTINGS, self.device, |txn| {
            for (i, (&channel, value)) in channels.iter().zip(values.iter_mut()).enumerate() {
                if i > 0 {
                    txn.deselect();
                    txn.select(self.device);
                }
                *value = sample(txn, channel)?;
            }
            Ok(())
        })
    }

    /// Read one input in volts
    pub fn read_voltage<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        average: u8,
    ) -> Result<f32, DriverError<S::Error>> {
        let raw = self.read_raw(arbiter, channel, average)?;
        Ok(raw_to_voltage(raw, channel))
    }

    /// True while front-panel button 1 or 2 is held
    ///
    /// Any other button number is `InvalidChannel`.
    pub fn is_button_pressed<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        button: u8,
    ) -> Result<bool, DriverError<S::Error>> {
        let channel = match button {
            1 | 2 => button + 5,
            _ => return Err(DriverError::InvalidChannel(button)),
        };
        Ok(self.read_raw(arbiter, channel, 1)? < MAX_VALUE / 2)
    }
}

impl Default for Mcp3208 {
    fn default() -> Self {
        Self::new(DeviceId::ADC)
    }
}

fn check_channel<E>(channel: u8) -> Result<(), DriverError<E>> {
    if channel < CHANNELS {
        Ok(())
    } else {
        Err(DriverError::InvalidChannel(channel))
    }
}

fn sample<S: SpiBus, P: OutputPin>(
    txn: &mut Transaction<'_, S, P>,
    channel: u8,
) -> Result<u16, DriverError<S::Error>> {
    let [high, low] = command_word(channel).to_be_bytes();
    let mut frame = [high, low, 0];
    txn.transfer_in_place(&mut frame)?;
    Ok((((frame[1] & 0x0F) as u16) << 8) | frame[2] as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use busmux_core::sim::{SimSpiBoard, SpiDeviceModel};

    /// Converter model: each sample of a channel returns `value` plus
    /// `jitter` on every second sample
    struct Converter {
        values: [u16; 8],
        jitter: u16,
        samples: u32,
        index: u8,
        command: u8,
        channel: u8,
    }

    impl Converter {
        fn new(values: [u16; 8]) -> Self {
            Self {
                values,
                jitter: 0,
                samples: 0,
                index: 0,
                command: 0,
                channel: 0,
            }
        }

        fn current(&self) -> u16 {
            let extra = if self.samples % 2 == 1 { self.jitter } else { 0 };
            self.values[self.channel as usize] + extra
        }
    }

    impl SpiDeviceModel for Converter {
        fn select(&mut self, _device: DeviceId) {
            self.index = 0;
        }

        fn exchange(&mut self, _device: DeviceId, mosi: u8) -> u8 {
            let index = self.index;
            self.index += 1;
            match index {
                0 => {
                    self.command = mosi;
                    0xFF
                }
                1 => {
                    self.channel = ((self.command & 0x01) << 2) | (mosi >> 6);
                    // Undriven bits float high; the null bit is 0
                    0xE0 | (self.current() >> 8) as u8
                }
                2 => {
                    let low = self.current() as u8;
                    self.samples += 1;
                    low
                }
                _ => 0,
            }
        }
    }

    #[test]
    fn test_command_bytes() {
        assert_eq!(command_word(0).to_be_bytes(), [0x06, 0x00]);
        assert_eq!(command_word(5).to_be_bytes(), [0x07, 0x40]);
        assert_eq!(command_word(7).to_be_bytes(), [0x07, 0xC0]);
    }

    #[test]
    fn test_read_raw() {
        let board = SimSpiBoard::new(Converter::new([0, 1, 2, 0xABC, 4, 5, 6, 7]));
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();

        assert_eq!(adc.read_raw(&mut arbiter, 3, 1), Ok(0xABC));
        assert_eq!(board.sent_to(DeviceId::ADC).as_slice(), &[0x06, 0xC0, 0x00]);
        assert_eq!(board.settings().map(|s| s.clock_hz()), Some(2_000_000));
        assert_eq!(board.current(), DeviceId::UNUSED);
    }

    #[test]
    fn test_averaging() {
        let mut converter = Converter::new([1000; 8]);
        converter.jitter = 10;
        let board = SimSpiBoard::new(converter);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();

        assert_eq!(adc.read_raw(&mut arbiter, 2, 4), Ok(1005));
        assert_eq!(board.sent_to(DeviceId::ADC).len(), 12);

        // Zero samples means one
        board.clear_transcript();
        adc.read_raw(&mut arbiter, 2, 0).unwrap();
        assert_eq!(board.sent_to(DeviceId::ADC).len(), 3);
    }

    #[test]
    fn test_read_multiple() {
        let board = SimSpiBoard::new(Converter::new([10, 11, 12, 13, 14, 15, 16, 17]));
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();

        let mut values = [0u16; 3];
        adc.read_raw_multiple(&mut arbiter, &[7, 0, 4], &mut values)
            .unwrap();
        assert_eq!(values, [17, 10, 14]);
        assert_eq!(board.configure_count(), 1);

        assert_eq!(
            adc.read_raw_multiple(&mut arbiter, &[1, 8], &mut values),
            Err(DriverError::InvalidChannel(8))
        );
    }

    #[test]
    fn test_voltage_scaling() {
        assert!((raw_to_voltage(0, 0) + 10.0).abs() < 1e-4);
        assert!(raw_to_voltage(2048, 1).abs() < 1e-3);
        assert!((raw_to_voltage(4095, 3) - BIPOLAR_RANGE.1).abs() < 1e-3);
        assert!(raw_to_voltage(0, 4).abs() < 1e-6);
        assert!((raw_to_voltage(4095, 7) - 2.4994).abs() < 1e-3);

        let board = SimSpiBoard::new(Converter::new([2048; 8]));
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();
        let volts = adc.read_voltage(&mut arbiter, 5, 1).unwrap();
        assert!((volts - 1.25).abs() < 1e-3);
    }

    #[test]
    fn test_buttons() {
        let board = SimSpiBoard::new(Converter::new([0, 0, 0, 0, 0, 0, 100, 4000]));
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();

        assert_eq!(adc.is_button_pressed(&mut arbiter, 1), Ok(true));
        assert_eq!(adc.is_button_pressed(&mut arbiter, 2), Ok(false));
        assert_eq!(
            adc.is_button_pressed(&mut arbiter, 3),
            Err(DriverError::InvalidChannel(3))
        );
    }

    #[test]
    fn test_invalid_channel() {
        let board = SimSpiBoard::new(Converter::new([0; 8]));
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let adc = Mcp3208::default();

        assert_eq!(
            adc.read_raw(&mut arbiter, 8, 1),
            Err(DriverError::InvalidChannel(8))
        );
        assert!(board.transcript().is_empty());
    }
}
