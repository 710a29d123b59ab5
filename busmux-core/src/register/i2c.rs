//! Sub-addressed I2C register access
//!
//! Bridge chips on the I2C bus take a sub-address byte of `register << 3`
//! (bits 2..1 select a channel, always 0 on single-channel parts).

use busmux_hal::I2cBus;

/// Highest register index that fits the sub-address field
pub const MAX_SUB_REGISTER: u8 = 0x0F;

/// I2C register access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cRegisterError<E> {
    /// Register index above [`MAX_SUB_REGISTER`]; nothing was sent
    InvalidRegister(u8),
    /// Transport error
    Bus(E),
}

/// A chip at a fixed 7-bit address with `register << 3` sub-addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubAddressDevice {
    address: u8,
}

impl SubAddressDevice {
    /// Chip at `address`
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// 7-bit bus address
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Sub-address byte for `register`
    pub const fn sub_address(register: u8) -> Option<u8> {
        if register > MAX_SUB_REGISTER {
            None
        } else {
            Some(register << 3)
        }
    }

    /// Write one register
    pub fn write_register<B: I2cBus>(
        &self,
        bus: &mut B,
        register: u8,
        value: u8,
    ) -> Result<(), I2cRegisterError<B::Error>> {
        let sub = Self::sub_address(register).ok_or(I2cRegisterError::InvalidRegister(register))?;
        bus.write(self.address, &[sub, value])
            .map_err(I2cRegisterError::Bus)
    }

    /// Read one register (sub-address write, repeated start, one-byte read)
    pub fn read_register<B: I2cBus>(
        &self,
        bus: &mut B,
        register: u8,
    ) -> Result<u8, I2cRegisterError<B::Error>> {
        let sub = Self::sub_address(register).ok_or(I2cRegisterError::InvalidRegister(register))?;
        let mut value = [0u8];
        bus.write_read(self.address, &[sub], &mut value)
            .map_err(I2cRegisterError::Bus)?;
        Ok(value[0])
    }

    /// Read, apply `f`, write back
    pub fn modify_register<B: I2cBus>(
        &self,
        bus: &mut B,
        register: u8,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<u8, I2cRegisterError<B::Error>> {
        let value = f(self.read_register(bus, register)?);
        self.write_register(bus, register, value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RegisterMap, SimI2cBus, SimI2cError};

    const BRIDGE: SubAddressDevice = SubAddressDevice::new(0x4D);

    #[test]
    fn test_sub_address() {
        assert_eq!(SubAddressDevice::sub_address(0x03), Some(0x18));
        assert_eq!(SubAddressDevice::sub_address(0x0F), Some(0x78));
        assert_eq!(SubAddressDevice::sub_address(0x10), None);
    }

    #[test]
    fn test_write_then_read() {
        let mut bus = SimI2cBus::new(RegisterMap::new(0x4D));
        BRIDGE.write_register(&mut bus, 0x07, 0x5A).unwrap();
        assert_eq!(bus.model().register(0x07), 0x5A);
        let (address, data) = bus.last_write().unwrap();
        assert_eq!(address, 0x4D);
        assert_eq!(data.as_slice(), &[0x38, 0x5A]);
        assert_eq!(BRIDGE.read_register(&mut bus, 0x07), Ok(0x5A));
    }

    #[test]
    fn test_modify() {
        let mut bus = SimI2cBus::new(RegisterMap::new(0x4D));
        BRIDGE.write_register(&mut bus, 0x03, 0x03).unwrap();
        let value = BRIDGE.modify_register(&mut bus, 0x03, |v| v | 0x80).unwrap();
        assert_eq!(value, 0x83);
        assert_eq!(bus.model().register(0x03), 0x83);
    }

    #[test]
    fn test_errors() {
        let mut bus = SimI2cBus::new(RegisterMap::new(0x4D));
        assert_eq!(
            BRIDGE.read_register(&mut bus, 0x10),
            Err(I2cRegisterError::InvalidRegister(0x10))
        );
        assert_eq!(bus.transfers(), 0);

        let absent = SubAddressDevice::new(0x20);
        assert_eq!(
            absent.write_register(&mut bus, 0x01, 0),
            Err(I2cRegisterError::Bus(SimI2cError::Nack))
        );
    }
}
