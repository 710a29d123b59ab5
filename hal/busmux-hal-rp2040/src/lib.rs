//! RP2040 HAL for the multiplexed bus board
//!
//! Implements the `busmux-hal` traits on embassy-rp peripherals:
//!
//! - Decoder select lines on push-pull outputs
//! - Open-drain SCL/SDA emulation on flex pins for bus recovery
//! - Blocking SPI, reconfigured per transaction
//! - Blocking I2C
//! - Busy-wait delay on the embassy time driver

#![no_std]

pub mod delay;
pub mod gpio;
pub mod i2c;
pub mod spi;

pub use delay::BusyDelay;
pub use gpio::{OpenDrainLine, SelectLine};
pub use i2c::{BlockingI2c, I2cBusError};
pub use spi::BlockingSpi;
