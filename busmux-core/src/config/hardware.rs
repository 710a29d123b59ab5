//! Pin and bus configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use busmux_hal::{BitOrder, I2cConfig, Mode, TransactionSettings};

use crate::i2c::RecoveryTiming;

/// Select line count (decoder inputs A, B, C)
pub const SELECT_PIN_COUNT: usize = 3;

/// Pin configuration with optional inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// GPIO number
    pub pin: u8,
    /// Pin is active-low (inverted)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl PinConfig {
    /// Create a new pin config
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: false,
        }
    }

    /// Create an inverted (active-low) pin
    pub const fn inverted(pin: u8) -> Self {
        Self {
            pin,
            inverted: true,
            pull_up: false,
        }
    }

    /// Create a pin with pull-up enabled
    pub const fn with_pullup(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: true,
        }
    }
}

/// SPI bus wiring and defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiBusConfig {
    /// Decoder inputs, bit 0 first
    pub select: [PinConfig; SELECT_PIN_COUNT],
    /// Clock
    pub sclk: PinConfig,
    /// Controller out
    pub mosi: PinConfig,
    /// Controller in
    pub miso: PinConfig,
    /// Clock applied by the arbiter at init (MSB first, mode 0)
    pub clock_hz: u32,
}

impl SpiBusConfig {
    /// Select lines on GPIO16/17/5, SCLK 18, MOSI 23, MISO 19, 4 MHz
    pub const DEFAULT: Self = Self {
        select: [PinConfig::new(16), PinConfig::new(17), PinConfig::new(5)],
        sclk: PinConfig::new(18),
        mosi: PinConfig::new(23),
        miso: PinConfig::new(19),
        clock_hz: 4_000_000,
    };

    /// Bus defaults for the arbiter; `None` for a zero clock
    pub const fn default_settings(&self) -> Option<TransactionSettings> {
        TransactionSettings::new(self.clock_hz, BitOrder::MsbFirst, Mode::Mode0)
    }
}

impl Default for SpiBusConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// I2C bus wiring, speed and recovery timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cBusConfig {
    /// Data line (open-drain, pulled up)
    pub sda: PinConfig,
    /// Clock line (open-drain, pulled up)
    pub scl: PinConfig,
    /// Bus clock in Hz
    pub frequency: u32,
    /// Bus-clear timing
    pub recovery: RecoveryTiming,
}

impl I2cBusConfig {
    /// SDA 21, SCL 22, 400 kHz, default recovery timing
    pub const DEFAULT: Self = Self {
        sda: PinConfig::with_pullup(21),
        scl: PinConfig::with_pullup(22),
        frequency: I2cConfig::FAST.frequency,
        recovery: RecoveryTiming::DEFAULT,
    };

    /// Peripheral configuration
    pub const fn bus_config(&self) -> I2cConfig {
        I2cConfig {
            frequency: self.frequency,
        }
    }
}

impl Default for I2cBusConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
