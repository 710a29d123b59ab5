//! Register framing for opcode-addressed SPI chips and sub-addressed I2C chips
//!
//! SPI command byte layout:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! [ opcode ][ register  ][ 0 0 0 ]
//! ```
//!
//! Read and write commands are followed by the register's 1 or 4 data bytes,
//! most significant byte first.

mod command;
mod device;
mod i2c;

pub use command::{Opcode, Register, RegisterCommand};
pub use device::{RegisterDevice, RegisterError};
pub use i2c::{I2cRegisterError, SubAddressDevice, MAX_SUB_REGISTER};
