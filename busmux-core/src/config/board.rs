//! Whole-board configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use busmux_hal::I2cConfig;
use heapless::FnvIndexSet;

use super::hardware::{I2cBusConfig, PinConfig, SpiBusConfig};
use crate::spi::DeviceId;

/// Highest GPIO number accepted by [`BoardConfig::validate`]
pub const MAX_GPIO: u8 = 39;

/// Default 7-bit I2C addresses
pub mod address {
    /// OLED display
    pub const OLED: u8 = 0x3C;
    /// SC16IS740 UART bridge
    pub const UART: u8 = 0x4D;
    /// External output port expander
    pub const EXT_OUT: u8 = 0x38;
    /// External input port expander
    pub const EXT_IN: u8 = 0x39;
    /// I2C-to-SPI bridge (CAN controller)
    pub const SPI_BRIDGE: u8 = 0x28;
    /// I2C EEPROM
    pub const EEPROM: u8 = 0x50;
}

/// Addresses of the I2C devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cAddresses {
    pub oled: u8,
    pub uart: u8,
    pub ext_out: u8,
    pub ext_in: u8,
    pub spi_bridge: u8,
    pub eeprom: u8,
}

impl I2cAddresses {
    /// Board defaults
    pub const DEFAULT: Self = Self {
        oled: address::OLED,
        uart: address::UART,
        ext_out: address::EXT_OUT,
        ext_in: address::EXT_IN,
        spi_bridge: address::SPI_BRIDGE,
        eeprom: address::EEPROM,
    };

    /// All addresses, for validation and scan reports
    pub const fn all(&self) -> [u8; 6] {
        [
            self.oled,
            self.uart,
            self.ext_out,
            self.ext_in,
            self.spi_bridge,
            self.eeprom,
        ]
    }
}

impl Default for I2cAddresses {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decoder slot of each SPI chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceMap {
    /// DAC outputs 0/1
    pub dac01: DeviceId,
    /// DAC outputs 2/3
    pub dac23: DeviceId,
    /// Counter channel 0
    pub qc0: DeviceId,
    /// Counter channel 1
    pub qc1: DeviceId,
    /// ADC
    pub adc: DeviceId,
    /// SPI EEPROM on an external slot
    pub eeprom: DeviceId,
    /// CAN controller on an external slot (may share the EEPROM slot)
    pub can: DeviceId,
}

impl DeviceMap {
    /// Board wiring; the EEPROM sits on external slot 5
    pub const DEFAULT: Self = Self {
        dac01: DeviceId::DAC01,
        dac23: DeviceId::DAC23,
        qc0: DeviceId::QC0,
        qc1: DeviceId::QC1,
        adc: DeviceId::ADC,
        eeprom: DeviceId::EXT5,
        can: DeviceId::CAN,
    };

    /// On-board chips, which must each have their own slot
    pub const fn on_board(&self) -> [DeviceId; 5] {
        [self.dac01, self.dac23, self.qc0, self.qc1, self.adc]
    }
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// GPIO number above [`MAX_GPIO`]
    InvalidPin(u8),
    /// GPIO assigned twice
    PinConflict(u8),
    /// Zero bus clock
    ZeroClock,
    /// A chip is mapped to slot 7
    UnassignedDevice,
    /// Two on-board chips share a slot
    SlotConflict(DeviceId),
    /// Address outside 1..=127
    InvalidAddress(u8),
    /// Two I2C devices share an address
    AddressConflict(u8),
    /// Buffer too small or serializer failure
    Encode,
    /// Stored bytes are not a configuration
    Decode,
}

/// Complete board description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    pub spi: SpiBusConfig,
    pub i2c: I2cBusConfig,
    pub devices: DeviceMap,
    pub addresses: I2cAddresses,
}

impl BoardConfig {
    /// The reference board
    pub const DEFAULT: Self = Self {
        spi: SpiBusConfig::DEFAULT,
        i2c: I2cBusConfig::DEFAULT,
        devices: DeviceMap::DEFAULT,
        addresses: I2cAddresses::DEFAULT,
    };

    /// Check pins, clocks, slots and addresses for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pins: FnvIndexSet<u8, 16> = FnvIndexSet::new();
        let spi = &self.spi;
        let all_pins: [PinConfig; 8] = [
            spi.select[0],
            spi.select[1],
            spi.select[2],
            spi.sclk,
            spi.mosi,
            spi.miso,
            self.i2c.sda,
            self.i2c.scl,
        ];
        for pin in all_pins {
            if pin.pin > MAX_GPIO {
                return Err(ConfigError::InvalidPin(pin.pin));
            }
            if !pins.insert(pin.pin).map_err(|_| ConfigError::PinConflict(pin.pin))? {
                return Err(ConfigError::PinConflict(pin.pin));
            }
        }

        if spi.clock_hz == 0 || self.i2c.frequency == 0 {
            return Err(ConfigError::ZeroClock);
        }

        let on_board = self.devices.on_board();
        for (i, slot) in on_board.iter().enumerate() {
            if slot.is_unused() {
                return Err(ConfigError::UnassignedDevice);
            }
            if on_board[..i].contains(slot) {
                return Err(ConfigError::SlotConflict(*slot));
            }
        }
        for external in [self.devices.eeprom, self.devices.can] {
            if external.is_unused() {
                return Err(ConfigError::UnassignedDevice);
            }
            if on_board.contains(&external) {
                return Err(ConfigError::SlotConflict(external));
            }
        }

        let addresses = self.addresses.all();
        for (i, &addr) in addresses.iter().enumerate() {
            if addr == 0 || addr > I2cConfig::MAX_ADDRESS {
                return Err(ConfigError::InvalidAddress(addr));
            }
            if addresses[..i].contains(&addr) {
                return Err(ConfigError::AddressConflict(addr));
            }
        }

        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Marker preceding a stored configuration
#[cfg(feature = "serde")]
pub const CONFIG_MAGIC: [u8; 2] = [0xB5, 0x3C];

/// Upper bound of an encoded configuration
#[cfg(feature = "serde")]
pub const MAX_ENCODED_LEN: usize = 128;

#[cfg(feature = "serde")]
impl BoardConfig {
    /// Encode as magic + postcard into `buf`, returning the used prefix
    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        let magic_len = CONFIG_MAGIC.len();
        if buf.len() < magic_len {
            return Err(ConfigError::Encode);
        }
        buf[..magic_len].copy_from_slice(&CONFIG_MAGIC);
        let body_len = postcard::to_slice(self, &mut buf[magic_len..])
            .map_err(|_| ConfigError::Encode)?
            .len();
        Ok(&mut buf[..magic_len + body_len])
    }

    /// Decode and validate a stored configuration
    ///
    /// Trailing bytes (e.g. the rest of an EEPROM page) are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let body = bytes
            .strip_prefix(&CONFIG_MAGIC[..])
            .ok_or(ConfigError::Decode)?;
        let config: Self = postcard::from_bytes(body).map_err(|_| ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }
}
