//! Peripheral drivers
//!
//! Chip drivers built on the `busmux-core` arbiter and register framing:
//!
//! - Quadrature counter (LS7366R, two channels)
//! - 12-bit DAC (MCP4922, four outputs on two chips)
//! - 12-bit ADC (MCP3208, eight inputs)
//! - I2C UART bridge (SC16IS740)
//! - I2C I/O expander pair (PCF8574A)
//! - I2C-to-SPI bridge in front of the CAN controller (SC18IS606)
//! - SPI EEPROM (25LCxxx)
//!
//! SPI drivers hold no bus handle; every call borrows the [`BusArbiter`]
//! and leaves it idle on return.
//!
//! [`BusArbiter`]: busmux_core::BusArbiter

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod bridge;
pub mod counter;
pub mod dac;
pub mod eeprom;
pub mod error;
pub mod extio;
pub mod uart;

pub use error::DriverError;
