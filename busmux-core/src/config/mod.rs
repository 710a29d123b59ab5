//! Board configuration
//!
//! Pin assignments, bus parameters, the decoder slot map and I2C addresses.
//! With the `serde` feature the whole [`BoardConfig`] round-trips through
//! postcard so it can live in the board EEPROM.

pub mod board;
pub mod hardware;

pub use board::*;
pub use hardware::*;
