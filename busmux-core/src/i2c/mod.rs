//! I2C bus health, hang recovery and the bus controller
//!
//! A slave reset or interrupted mid-byte can be left holding SDA low,
//! which blocks every START. Recovery bit-bangs SCL in open-drain fashion
//! until the slave finishes its byte and lets go, then issues a STOP.

mod controller;
mod health;
mod recovery;

pub use controller::{I2cController, I2cError, I2cSession, MAX_DEVICES};
pub use health::I2cBusHealth;
pub use recovery::{BusRecovery, RecoveryTiming, MIN_HALF_PERIOD_US, MIN_SETTLE_MS};
