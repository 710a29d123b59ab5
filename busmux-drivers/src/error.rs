//! Errors shared by the SPI drivers

use busmux_core::spi::BusError;

/// SPI driver errors
///
/// Argument checks happen before the bus is touched, so `InvalidChannel`
/// and `OutOfRange` mean nothing was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// Channel does not exist on this chip
    InvalidChannel(u8),
    /// Value outside what the chip accepts (address, raw code, NaN)
    OutOfRange,
    /// Chip stayed busy past the polling budget
    Timeout,
    /// Arbiter or transport error
    Bus(BusError<E>),
}

impl<E> From<BusError<E>> for DriverError<E> {
    fn from(err: BusError<E>) -> Self {
        DriverError::Bus(err)
    }
}
