//! SPI bus abstractions
//!
//! The bus is shared by every device behind the chip-select decoder, so it
//! is reconfigured at the start of each transaction from that device's
//! [`TransactionSettings`].

/// SPI bus master
///
/// Only [`SpiBus::transfer_in_place`] and [`SpiBus::configure`] are required;
/// the remaining operations are expressed in terms of it.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Apply clock rate, bit order and clock mode for the next transfers
    fn configure(&mut self, settings: &TransactionSettings) -> Result<(), Self::Error>;

    /// Transfer data in place
    ///
    /// Writes data from buffer while reading into the same buffer.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Transfer data (simultaneous read/write)
    ///
    /// Both buffers must be the same length; extra bytes in either are ignored.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        for (r, w) in read.iter_mut().zip(write.iter()) {
            let mut byte = [*w];
            self.transfer_in_place(&mut byte)?;
            *r = byte[0];
        }
        Ok(())
    }

    /// Write data, discarding what is clocked in
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for &b in data {
            let mut byte = [b];
            self.transfer_in_place(&mut byte)?;
        }
        Ok(())
    }

    /// Read data (writes zeros)
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        buf.fill(0);
        self.transfer_in_place(buf)
    }
}

/// SPI bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// Settings for one logical device's transactions
///
/// Immutable once built. The arbiter borrows it for the duration of a
/// transaction and applies it to the bus when the transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransactionSettings {
    clock_hz: u32,
    bit_order: BitOrder,
    mode: Mode,
}

impl TransactionSettings {
    /// Bus default: 4 MHz, MSB first, mode 0
    pub const DEFAULT: Self = Self::preset(4_000_000);

    /// Build settings; `None` if the clock rate is zero
    pub const fn new(clock_hz: u32, bit_order: BitOrder, mode: Mode) -> Option<Self> {
        if clock_hz == 0 {
            return None;
        }
        Some(Self {
            clock_hz,
            bit_order,
            mode,
        })
    }

    /// MSB-first, mode 0 settings at the given (non-zero) clock
    ///
    /// Intended for compile-time presets; a zero clock fails const evaluation.
    pub const fn preset(clock_hz: u32) -> Self {
        match Self::new(clock_hz, BitOrder::MsbFirst, Mode::Mode0) {
            Some(settings) => settings,
            None => panic!("SPI clock must be non-zero"),
        }
    }

    /// Clock rate in Hz (always > 0)
    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Bit order on the wire
    pub const fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    /// Clock polarity/phase
    pub const fn mode(&self) -> Mode {
        self.mode
    }
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_clock_rejected() {
        assert!(TransactionSettings::new(0, BitOrder::MsbFirst, Mode::Mode0).is_none());
        let s = TransactionSettings::new(1_000_000, BitOrder::LsbFirst, Mode::Mode3).unwrap();
        assert_eq!(s.clock_hz(), 1_000_000);
        assert_eq!(s.bit_order(), BitOrder::LsbFirst);
        assert_eq!(s.mode(), Mode::Mode3);
    }

    #[test]
    fn test_default_settings() {
        let s = TransactionSettings::default();
        assert_eq!(s.clock_hz(), 4_000_000);
        assert_eq!(s.bit_order(), BitOrder::MsbFirst);
        assert_eq!(s.mode(), Mode::Mode0);
    }

    #[test]
    fn test_mode_split() {
        let (pol, pha): (Polarity, Phase) = Mode::Mode1.into();
        assert_eq!(pol, Polarity::IdleLow);
        assert_eq!(pha, Phase::CaptureOnSecondTransition);

        let (pol, pha): (Polarity, Phase) = Mode::Mode2.into();
        assert_eq!(pol, Polarity::IdleHigh);
        assert_eq!(pha, Phase::CaptureOnFirstTransition);
    }

    struct Loopback {
        configured: Option<TransactionSettings>,
    }

    impl SpiBus for Loopback {
        type Error = ();

        fn configure(&mut self, settings: &TransactionSettings) -> Result<(), ()> {
            self.configured = Some(*settings);
            Ok(())
        }

        fn transfer_in_place(&mut self, _data: &mut [u8]) -> Result<(), ()> {
            Ok(())
        }
    }

    #[test]
    fn test_provided_transfer_methods() {
        let mut bus = Loopback { configured: None };
        bus.configure(&TransactionSettings::preset(2_000_000)).unwrap();
        assert_eq!(bus.configured.map(|s| s.clock_hz()), Some(2_000_000));

        let mut read = [0u8; 3];
        bus.transfer(&mut read, &[1, 2, 3]).unwrap();
        assert_eq!(read, [1, 2, 3]);

        let mut buf = [0xAA; 2];
        bus.read(&mut buf).unwrap();
        assert_eq!(buf, [0, 0]);
    }
}
