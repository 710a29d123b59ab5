//! Simulated hardware for host tests
//!
//! Everything here shares state through `Cell`/`RefCell` so pins, buses and
//! delays can be handed out as separate values (as real HAL objects are)
//! while the test still observes the whole board.

mod clock;
mod i2c;
mod spi;

pub use clock::{SimClock, SimDelay};
pub use i2c::{
    I2cDeviceModel, Presence, RegisterMap, SimI2cBus, SimI2cError, SimI2cWire, SimLine, SimSlave,
};
pub use spi::{
    Exchange, Loopback, RegisterFile, SimSelectPin, SimSpi, SimSpiBoard, SimSpiError,
    SpiDeviceModel, TRANSCRIPT_LEN,
};
