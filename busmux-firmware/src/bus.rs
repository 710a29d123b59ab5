//! Shared bus handles
//!
//! Each physical bus sits behind one async mutex; holding the guard is the
//! only way to reach the arbiter or the I2C controller.

use embassy_rp::peripherals::{I2C0, SPI0};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use busmux_core::{BusArbiter, I2cController};
use busmux_hal_rp2040::{BlockingI2c, BlockingSpi, SelectLine};

/// SPI arbiter over SPI0 and the three decoder lines
pub type SpiArbiter = BusArbiter<BlockingSpi<'static, SPI0>, SelectLine<'static>>;

/// I2C controller over I2C0
pub type I2cBusController = I2cController<BlockingI2c<'static, I2C0>>;

pub type SharedSpi = Mutex<CriticalSectionRawMutex, SpiArbiter>;

pub type SharedI2c = Mutex<CriticalSectionRawMutex, I2cBusController>;
