//! Non-volatile storage

pub mod spi_eeprom;

pub use spi_eeprom::{Geometry, SpiEeprom};
