//! Blocking I2C master

use busmux_hal::{I2cBus, I2cConfig};
use embassy_rp::i2c::{self, Blocking, I2c, Instance};

/// Error from I2C operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusError {
    /// No acknowledge from the addressed device
    Nack,
    /// Arbitration lost
    ArbitrationLost,
    /// Address outside 7-bit range or reserved
    InvalidAddress,
    /// Buffer length the peripheral cannot handle
    InvalidLength,
    /// Other abort
    Other,
}

impl From<i2c::Error> for I2cBusError {
    fn from(e: i2c::Error) -> Self {
        match e {
            i2c::Error::Abort(i2c::AbortReason::NoAcknowledge) => I2cBusError::Nack,
            i2c::Error::Abort(i2c::AbortReason::ArbitrationLoss) => I2cBusError::ArbitrationLost,
            i2c::Error::AddressOutOfRange(_) | i2c::Error::AddressReserved(_) => {
                I2cBusError::InvalidAddress
            }
            i2c::Error::InvalidReadBufferLength | i2c::Error::InvalidWriteBufferLength => {
                I2cBusError::InvalidLength
            }
            _ => I2cBusError::Other,
        }
    }
}

/// Peripheral configuration for `config`
pub fn config_for(config: &I2cConfig) -> i2c::Config {
    let mut out = i2c::Config::default();
    out.frequency = config.frequency;
    out
}

/// I2C master attached after bus recovery
pub struct BlockingI2c<'d, T: Instance> {
    i2c: I2c<'d, T, Blocking>,
}

impl<'d, T: Instance> BlockingI2c<'d, T> {
    /// Wrap a blocking embassy I2C master
    pub fn new(i2c: I2c<'d, T, Blocking>) -> Self {
        Self { i2c }
    }
}

impl<T: Instance> I2cBus for BlockingI2c<'_, T> {
    type Error = I2cBusError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        if data.is_empty() {
            // The controller cannot send an address-only frame; a one-byte
            // read acknowledges the same way
            let mut scratch = [0u8];
            return Ok(self.i2c.blocking_read(address, &mut scratch)?);
        }
        Ok(self.i2c.blocking_write(address, data)?)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        Ok(self.i2c.blocking_read(address, buf)?)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        Ok(self.i2c.blocking_write_read(address, write_data, read_buf)?)
    }
}
