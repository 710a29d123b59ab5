//! Process-wide I2C bus context
//!
//! Recovery needs SCL and SDA as plain GPIOs while the I2C peripheral needs
//! them as bus pins, so bring-up is two-phase: [`I2cController::recover`]
//! runs on borrowed lines, then [`I2cController::attach`] hands over the
//! real bus once the lines are known to be free.

use busmux_hal::{I2cBus, I2cConfig, OpenDrainPin};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use super::health::I2cBusHealth;
use super::recovery::{BusRecovery, RecoveryTiming};

/// Largest possible scan result (addresses 1..=127)
pub const MAX_DEVICES: usize = 127;

/// Controller errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// No bus attached yet
    NotInitialized,
    /// A bus is already attached
    AlreadyInitialized,
    /// `attach` called before any recovery attempt
    NotRecovered,
    /// The last recovery attempt left the bus unusable
    BusUnusable(I2cBusHealth),
}

/// I2C bus owner: recovery bookkeeping plus the attached bus
pub struct I2cController<B> {
    bus: Option<B>,
    recovery: BusRecovery,
    last_health: Option<I2cBusHealth>,
}

impl<B: I2cBus> I2cController<B> {
    /// Create with no bus attached
    pub fn new(timing: RecoveryTiming) -> Self {
        Self {
            bus: None,
            recovery: BusRecovery::new(timing),
            last_health: None,
        }
    }

    /// Run the bus-clear sequence on the raw lines
    ///
    /// Once a bus is attached this returns the cached result without
    /// touching the lines.
    pub fn recover<C, D, T>(&mut self, scl: &mut C, sda: &mut D, delay: &mut T) -> I2cBusHealth
    where
        C: OpenDrainPin,
        D: OpenDrainPin,
        T: DelayNs,
    {
        if let (true, Some(health)) = (self.bus.is_some(), self.last_health) {
            return health;
        }

        let health = self.recovery.recover(scl, sda, delay);
        self.last_health = Some(health);

        #[cfg(feature = "defmt")]
        {
            if health.is_usable() {
                defmt::info!("{}", health.message());
            } else {
                defmt::error!("{}", health.message());
            }
        }

        health
    }

    /// Take ownership of the configured bus
    ///
    /// Accepted only after a recovery attempt that left the bus usable.
    pub fn attach(&mut self, bus: B) -> Result<I2cBusHealth, I2cError> {
        if self.bus.is_some() {
            return Err(I2cError::AlreadyInitialized);
        }
        let health = self.last_health.ok_or(I2cError::NotRecovered)?;
        if !health.is_usable() {
            return Err(I2cError::BusUnusable(health));
        }
        self.bus = Some(bus);
        Ok(health)
    }

    /// Give the bus back (e.g. to retry recovery)
    pub fn detach(&mut self) -> Option<B> {
        self.bus.take()
    }

    /// Borrow the bus for a sequence of transfers
    pub fn bus(&mut self) -> Result<I2cSession<'_, B>, I2cError> {
        self.bus
            .as_mut()
            .map(|bus| I2cSession { bus })
            .ok_or(I2cError::NotInitialized)
    }

    /// True once a bus is attached
    pub fn is_initialized(&self) -> bool {
        self.bus.is_some()
    }

    /// Result of the most recent recovery attempt
    pub fn last_health(&self) -> Option<I2cBusHealth> {
        self.last_health
    }

    /// SCL pulses issued across all attempts
    pub fn pulses_issued(&self) -> u32 {
        self.recovery.pulses_issued()
    }

    /// Effective recovery timing
    pub fn timing(&self) -> &RecoveryTiming {
        self.recovery.timing()
    }
}

impl<B: I2cBus> Default for I2cController<B> {
    fn default() -> Self {
        Self::new(RecoveryTiming::DEFAULT)
    }
}

/// Exclusive access to the attached bus
pub struct I2cSession<'a, B> {
    bus: &'a mut B,
}

impl<B: I2cBus> I2cSession<'_, B> {
    /// Address-only write; true if a device acknowledged
    pub fn probe(&mut self, address: u8) -> bool {
        address <= I2cConfig::MAX_ADDRESS && self.bus.write(address, &[]).is_ok()
    }

    /// Probe every address from 1 to 127
    pub fn scan(&mut self) -> Vec<u8, MAX_DEVICES> {
        let mut found = Vec::new();
        for address in 1..=I2cConfig::MAX_ADDRESS {
            if self.probe(address) {
                // Capacity covers every address
                let _ = found.push(address);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::info!("I2C scan: {} device(s)", found.len());

        found
    }
}

impl<B: I2cBus> I2cBus for I2cSession<'_, B> {
    type Error = B::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.bus.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.read(address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.write_read(address, write_data, read_buf)
    }
}
