//! I2C-to-SPI bridges

pub mod sc18is606;

pub use sc18is606::{BridgeError, GpioMode, Sc18is606, SpiClock};
