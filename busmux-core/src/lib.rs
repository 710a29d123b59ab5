//! Board-agnostic bus core for the multiplexed peripheral board
//!
//! This crate contains all bus logic that does not depend on a specific
//! MCU, written against the `busmux-hal` traits:
//!
//! - SPI arbitration across the eight slots of a 1-of-8 chip-select decoder
//! - I2C bus-hang detection and bit-banged recovery
//! - Opcode/register framing shared by the register-addressed chips
//! - Board configuration (pins, device map, addresses)
//!
//! With the `sim` feature (always on for this crate's own tests) the
//! [`sim`] module provides simulated pins, buses and a clock for host tests.

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod i2c;
pub mod register;
pub mod spi;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use i2c::{BusRecovery, I2cBusHealth, I2cController, I2cError, I2cSession, RecoveryTiming};
pub use register::{Opcode, Register, RegisterCommand, RegisterDevice, RegisterError};
pub use spi::{BusArbiter, BusError, BusState, DeviceId, Transaction};
