//! I2C I/O expanders

pub mod pcf8574;

pub use pcf8574::{ExtIo, ExtIoError, Pcf8574};
