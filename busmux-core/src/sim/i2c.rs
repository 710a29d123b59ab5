//! Simulated I2C wires and bus

use core::cell::Cell;

use busmux_hal::{I2cBus, LineMode, OpenDrainPin};
use heapless::Vec;

use super::clock::{SimClock, SimDelay};

/// What the misbehaving slave does to the wires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSlave {
    /// SDA stays low until this many SCL pulses have been seen
    pub sda_held_for: u32,
    /// SCL is shorted low
    pub scl_stuck: bool,
    /// After pulse `n` (1-based) SCL is held low for the given microseconds
    pub stretch_at: Option<(u32, u64)>,
}

impl SimSlave {
    /// Well-behaved bus
    pub const IDLE: Self = Self {
        sda_held_for: 0,
        scl_stuck: false,
        stretch_at: None,
    };

    /// SDA released after `pulses` clock pulses
    pub const fn holding_sda(pulses: u32) -> Self {
        Self {
            sda_held_for: pulses,
            ..Self::IDLE
        }
    }

    /// SDA never released
    pub const fn stuck_sda() -> Self {
        Self::holding_sda(u32::MAX)
    }

    /// SCL shorted low
    pub const fn stuck_scl() -> Self {
        Self {
            scl_stuck: true,
            ..Self::IDLE
        }
    }

    /// SDA never released; after pulse `at_pulse` SCL is stretched for
    /// `hold_us`
    pub const fn stretching(at_pulse: u32, hold_us: u64) -> Self {
        Self {
            stretch_at: Some((at_pulse, hold_us)),
            ..Self::stuck_sda()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    Scl,
    Sda,
}

/// SCL and SDA with pull-ups, one slave, and a clock
pub struct SimI2cWire {
    clock: SimClock,
    slave: SimSlave,
    scl_driven_low: Cell<bool>,
    sda_driven_low: Cell<bool>,
    pulses: Cell<u32>,
    stretch_until_ns: Cell<u64>,
    stops: Cell<u32>,
}

impl SimI2cWire {
    /// Both lines released at t = 0
    pub fn new(slave: SimSlave) -> Self {
        Self {
            clock: SimClock::new(),
            slave,
            scl_driven_low: Cell::new(false),
            sda_driven_low: Cell::new(false),
            pulses: Cell::new(0),
            stretch_until_ns: Cell::new(0),
            stops: Cell::new(0),
        }
    }

    /// SCL, SDA and a delay advancing this wire's clock
    pub fn lines(&self) -> (SimLine<'_>, SimLine<'_>, SimDelay<'_>) {
        (self.scl(), self.sda(), self.clock.delay())
    }

    /// SCL handle
    pub fn scl(&self) -> SimLine<'_> {
        SimLine {
            wire: self,
            which: Wire::Scl,
        }
    }

    /// SDA handle
    pub fn sda(&self) -> SimLine<'_> {
        SimLine {
            wire: self,
            which: Wire::Sda,
        }
    }

    /// Simulated time in microseconds
    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    /// SCL falling edges we generated
    pub fn scl_pulses(&self) -> u32 {
        self.pulses.get()
    }

    /// SDA low-to-released transitions made while SCL was high
    pub fn stop_conditions(&self) -> u32 {
        self.stops.get()
    }

    /// True if neither line is being pulled low by us
    pub fn released(&self) -> bool {
        !self.scl_driven_low.get() && !self.sda_driven_low.get()
    }

    /// SCL wire level
    pub fn scl_high(&self) -> bool {
        !self.scl_driven_low.get() && !self.slave_holds_scl()
    }

    /// SDA wire level
    pub fn sda_high(&self) -> bool {
        !self.sda_driven_low.get() && !self.slave_holds_sda()
    }

    fn slave_holds_scl(&self) -> bool {
        self.slave.scl_stuck || self.clock.now_ns() < self.stretch_until_ns.get()
    }

    fn slave_holds_sda(&self) -> bool {
        self.pulses.get() < self.slave.sda_held_for
    }

    fn set_mode(&self, which: Wire, mode: LineMode) {
        let low = mode == LineMode::DrivenLow;
        match which {
            Wire::Scl => {
                if low && !self.scl_driven_low.get() {
                    let pulse = self.pulses.get() + 1;
                    self.pulses.set(pulse);
                    if let Some((at, hold_us)) = self.slave.stretch_at {
                        if at == pulse {
                            self.stretch_until_ns
                                .set(self.clock.now_ns() + hold_us * 1_000);
                        }
                    }
                }
                self.scl_driven_low.set(low);
            }
            Wire::Sda => {
                let releasing = !low && self.sda_driven_low.get();
                self.sda_driven_low.set(low);
                if releasing && self.scl_high() {
                    self.stops.set(self.stops.get() + 1);
                }
            }
        }
    }
}

/// One open-drain wire
pub struct SimLine<'a> {
    wire: &'a SimI2cWire,
    which: Wire,
}

impl OpenDrainPin for SimLine<'_> {
    fn set_mode(&mut self, mode: LineMode) {
        self.wire.set_mode(self.which, mode);
    }

    fn is_high(&self) -> bool {
        match self.which {
            Wire::Scl => self.wire.scl_high(),
            Wire::Sda => self.wire.sda_high(),
        }
    }
}

/// Simulated transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimI2cError {
    /// Address not acknowledged
    Nack,
}

/// Devices behind a [`SimI2cBus`]
pub trait I2cDeviceModel {
    /// True if a device answers at `address`
    fn acknowledges(&self, address: u8) -> bool;

    /// Bytes written to an acknowledging device
    fn write(&mut self, _address: u8, _data: &[u8]) {}

    /// Bytes read from an acknowledging device
    fn read(&mut self, _address: u8, buf: &mut [u8]) {
        buf.fill(0xFF);
    }
}

/// Set of addresses that acknowledge and otherwise do nothing
#[derive(Debug, Clone)]
pub struct Presence {
    present: [bool; 128],
}

impl Presence {
    /// Empty bus
    pub fn none() -> Self {
        Self {
            present: [false; 128],
        }
    }

    /// Devices at `addresses`
    pub fn at(addresses: &[u8]) -> Self {
        let mut presence = Self::none();
        for &address in addresses {
            if let Some(slot) = presence.present.get_mut(address as usize) {
                *slot = true;
            }
        }
        presence
    }
}

impl I2cDeviceModel for Presence {
    fn acknowledges(&self, address: u8) -> bool {
        self.present.get(address as usize).copied().unwrap_or(false)
    }
}

/// A chip with sixteen 8-bit registers and `register << 3` sub-addressing
#[derive(Debug, Clone)]
pub struct RegisterMap {
    address: u8,
    registers: [u8; 16],
    pointer: usize,
}

impl RegisterMap {
    /// Chip at `address`, all registers zero
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 16],
            pointer: 0,
        }
    }

    /// Register contents
    pub fn register(&self, register: u8) -> u8 {
        self.registers[(register & 0x0F) as usize]
    }
}

impl I2cDeviceModel for RegisterMap {
    fn acknowledges(&self, address: u8) -> bool {
        address == self.address
    }

    fn write(&mut self, _address: u8, data: &[u8]) {
        if let Some((&sub, payload)) = data.split_first() {
            self.pointer = ((sub >> 3) & 0x0F) as usize;
            for &byte in payload {
                self.registers[self.pointer] = byte;
            }
        }
    }

    fn read(&mut self, _address: u8, buf: &mut [u8]) {
        buf.fill(self.registers[self.pointer]);
    }
}

/// I2C bus over a device model
pub struct SimI2cBus<M> {
    model: M,
    transfers: u32,
    last_write: Option<(u8, Vec<u8, 8>)>,
}

impl<M: I2cDeviceModel> SimI2cBus<M> {
    /// Bus with `model` attached
    pub fn new(model: M) -> Self {
        Self {
            model,
            transfers: 0,
            last_write: None,
        }
    }

    /// The attached devices
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The attached devices, mutably
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Transfers attempted (including NACKed ones)
    pub fn transfers(&self) -> u32 {
        self.transfers
    }

    /// Address and first bytes of the last acknowledged write
    pub fn last_write(&self) -> Option<(u8, Vec<u8, 8>)> {
        self.last_write.clone()
    }

    fn start(&mut self, address: u8) -> Result<(), SimI2cError> {
        self.transfers += 1;
        if self.model.acknowledges(address) {
            Ok(())
        } else {
            Err(SimI2cError::Nack)
        }
    }
}

impl<M: I2cDeviceModel> I2cBus for SimI2cBus<M> {
    type Error = SimI2cError;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), SimI2cError> {
        self.start(address)?;
        self.last_write = Some((address, data.iter().copied().take(8).collect()));
        self.model.write(address, data);
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), SimI2cError> {
        self.start(address)?;
        self.model.read(address, buf);
        Ok(())
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), SimI2cError> {
        self.start(address)?;
        self.model.write(address, write_data);
        self.model.read(address, read_buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_levels() {
        let wire = SimI2cWire::new(SimSlave::holding_sda(1));
        let (mut scl, sda, _) = wire.lines();
        assert!(scl.is_high());
        assert!(sda.is_low());

        scl.pull_low();
        assert!(scl.is_low());
        scl.release();
        assert!(sda.is_high());
        assert_eq!(wire.scl_pulses(), 1);
    }

    #[test]
    fn test_stop_detected() {
        let wire = SimI2cWire::new(SimSlave::IDLE);
        let (mut scl, mut sda, _) = wire.lines();

        // SDA released while SCL is low: not a STOP
        scl.pull_low();
        sda.pull_low();
        sda.release();
        assert_eq!(wire.stop_conditions(), 0);

        scl.release();
        sda.pull_low();
        sda.release();
        assert_eq!(wire.stop_conditions(), 1);
    }
}
