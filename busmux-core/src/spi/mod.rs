//! SPI bus arbitration
//!
//! One SPI bus is shared by up to seven chips whose chip selects come from a
//! 74HC138 1-of-8 decoder driven by three GPIO lines. Code 7 is wired to
//! nothing, so driving 7 deselects every chip.
//!
//! All bus access goes through a [`Transaction`], which is the only way to
//! select a device and move bytes; dropping it always leaves the lines at 7.

mod arbiter;
mod device;
mod state;

pub use arbiter::{BusArbiter, BusError, SelectLines, Transaction, SELECT_LINES};
pub use device::DeviceId;
pub use state::{BusEvent, BusState, BusViolation};
