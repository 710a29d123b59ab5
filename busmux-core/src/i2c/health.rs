//! Outcome of one recovery attempt

/// Bus state as found (and possibly fixed) by a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cBusHealth {
    /// Both lines were high; nothing to do
    Ok,
    /// SDA was stuck and has been freed
    Repaired,
    /// SCL was low before any pulse (short or missing pull-up)
    ErrClockLineLow,
    /// A slave held SCL low past the stretch timeout
    ErrClockLineLowSlaveStretch,
    /// SDA stayed low through the whole pulse budget
    ErrDataLineLow,
}

impl I2cBusHealth {
    /// True if the bus can be used afterwards
    pub fn is_usable(&self) -> bool {
        matches!(self, I2cBusHealth::Ok | I2cBusHealth::Repaired)
    }

    /// Status line text
    pub fn message(&self) -> &'static str {
        match self {
            I2cBusHealth::Ok => "I2C - BUS OK",
            I2cBusHealth::Repaired => "I2C - BUS REPAIRED",
            I2cBusHealth::ErrClockLineLow => "I2C - CLK LINE LOW",
            I2cBusHealth::ErrClockLineLowSlaveStretch => "I2C - SLAVE CLK LINE LOW",
            I2cBusHealth::ErrDataLineLow => "I2C - SDA LINE LOW",
        }
    }

    /// Numeric code for status reports
    pub fn code(&self) -> u8 {
        match self {
            I2cBusHealth::Ok => 0,
            I2cBusHealth::ErrClockLineLow => 1,
            I2cBusHealth::ErrClockLineLowSlaveStretch => 2,
            I2cBusHealth::ErrDataLineLow => 3,
            I2cBusHealth::Repaired => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable() {
        assert!(I2cBusHealth::Ok.is_usable());
        assert!(I2cBusHealth::Repaired.is_usable());
        assert!(!I2cBusHealth::ErrClockLineLow.is_usable());
        assert!(!I2cBusHealth::ErrClockLineLowSlaveStretch.is_usable());
        assert!(!I2cBusHealth::ErrDataLineLow.is_usable());
    }

    #[test]
    fn test_messages_and_codes() {
        assert_eq!(I2cBusHealth::Repaired.message(), "I2C - BUS REPAIRED");
        assert_eq!(I2cBusHealth::ErrDataLineLow.message(), "I2C - SDA LINE LOW");
        assert_eq!(I2cBusHealth::Ok.code(), 0);
        assert_eq!(I2cBusHealth::ErrClockLineLowSlaveStretch.code(), 2);
        assert_eq!(I2cBusHealth::Repaired.code(), 4);
    }
}
