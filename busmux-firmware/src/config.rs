//! Board configuration
//!
//! The compiled wiring is authoritative for pins and decoder slots, since
//! those are fixed by the PCB and by the typed peripherals in `main`. Bus
//! clocks, recovery timing and I2C addresses can be overridden by a copy
//! stored at the start of the SPI EEPROM.

use defmt::*;

use busmux_core::config::{
    BoardConfig, ConfigError, I2cBusConfig, PinConfig, SpiBusConfig, MAX_ENCODED_LEN,
};
use busmux_drivers::eeprom::{Geometry, SpiEeprom};
use busmux_hal_rp2040::BusyDelay;

use crate::bus::SpiArbiter;

/// RP2040 carrier wiring
///
/// Select lines GPIO16/17/15, SPI0 on 18/19/20, I2C0 SDA 12 / SCL 13.
pub const BOARD: BoardConfig = BoardConfig {
    spi: SpiBusConfig {
        select: [PinConfig::new(16), PinConfig::new(17), PinConfig::new(15)],
        sclk: PinConfig::new(18),
        mosi: PinConfig::new(19),
        miso: PinConfig::new(20),
        ..SpiBusConfig::DEFAULT
    },
    i2c: I2cBusConfig {
        sda: PinConfig::with_pullup(12),
        scl: PinConfig::with_pullup(13),
        ..I2cBusConfig::DEFAULT
    },
    ..BoardConfig::DEFAULT
};

/// EEPROM address of the stored configuration
pub const CONFIG_ADDRESS: u16 = 0;

/// Apply the tunable parts of `stored` to `compiled`
pub fn merge(compiled: &BoardConfig, stored: &BoardConfig) -> BoardConfig {
    if stored.spi.select != compiled.spi.select || stored.devices != compiled.devices {
        warn!("Stored wiring differs from this board; keeping compiled pins and slots");
    }
    BoardConfig {
        spi: SpiBusConfig {
            clock_hz: stored.spi.clock_hz,
            ..compiled.spi
        },
        i2c: I2cBusConfig {
            frequency: stored.i2c.frequency,
            recovery: stored.i2c.recovery,
            ..compiled.i2c
        },
        addresses: stored.addresses,
        ..*compiled
    }
}

/// Load the stored configuration, provisioning the EEPROM if it holds none
pub fn load(arbiter: &mut SpiArbiter, compiled: &BoardConfig) -> BoardConfig {
    let eeprom = SpiEeprom::new(compiled.devices.eeprom, Geometry::LC640);
    let mut buf = [0u8; MAX_ENCODED_LEN];

    if let Err(e) = eeprom.read(arbiter, CONFIG_ADDRESS, &mut buf) {
        warn!("Config EEPROM read failed: {}", e);
        return *compiled;
    }

    match BoardConfig::from_bytes(&buf) {
        Ok(stored) => {
            info!("Board config loaded from EEPROM");
            merge(compiled, &stored)
        }
        Err(ConfigError::Decode) => {
            info!("No stored board config, writing defaults");
            store(arbiter, &eeprom, compiled);
            *compiled
        }
        Err(e) => {
            warn!("Stored board config rejected: {}", e);
            *compiled
        }
    }
}

fn store(arbiter: &mut SpiArbiter, eeprom: &SpiEeprom, config: &BoardConfig) {
    let mut buf = [0u8; MAX_ENCODED_LEN];
    let bytes = match config.to_bytes(&mut buf) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Board config encode failed: {}", e);
            return;
        }
    };
    if let Err(e) = eeprom.write(arbiter, &mut BusyDelay, CONFIG_ADDRESS, bytes) {
        warn!("Board config store failed: {}", e);
    }
}
