//! Register access over the SPI arbiter

use busmux_hal::{OutputPin, SpiBus, TransactionSettings};

use super::command::{Opcode, Register, RegisterCommand};
use crate::spi::{BusArbiter, BusError, DeviceId};

/// Register access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError<E> {
    /// Channel above the device's highest channel; nothing was sent
    InvalidChannel(u8),
    /// Arbiter or transport error
    Bus(BusError<E>),
}

impl<E> From<BusError<E>> for RegisterError<E> {
    fn from(err: BusError<E>) -> Self {
        RegisterError::Bus(err)
    }
}

/// A family of identical register-addressed chips, one per channel
///
/// Channel `n` maps to the decoder slot `devices[n]`; every access is one
/// complete transaction with that slot selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDevice<const N: usize> {
    devices: [DeviceId; N],
    settings: TransactionSettings,
}

impl<const N: usize> RegisterDevice<N> {
    /// Create from the channel-to-slot map and the chips' bus settings
    pub const fn new(devices: [DeviceId; N], settings: TransactionSettings) -> Self {
        Self { devices, settings }
    }

    /// Highest valid channel
    pub const fn max_channel(&self) -> u8 {
        (N as u8).saturating_sub(1)
    }

    /// Bus settings used for every access
    pub fn settings(&self) -> &TransactionSettings {
        &self.settings
    }

    /// Slot of `channel`
    pub fn device(&self, channel: u8) -> Option<DeviceId> {
        self.devices.get(channel as usize).copied()
    }

    /// Write `value` to `register`
    ///
    /// Only the low byte is sent for 1-byte registers.
    pub fn write_register<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: Register,
        value: u32,
    ) -> Result<(), RegisterError<S::Error>> {
        let device = self.checked_device::<S::Error>(channel)?;
        let width = register.width();
        let bytes = value.to_be_bytes();

        arbiter.transaction(&self.settings, device, |txn| {
            txn.write_byte(RegisterCommand::write(register).byte())?;
            for &byte in &bytes[4 - width..] {
                txn.write_byte(byte)?;
            }
            Ok(())
        })
    }

    /// Read `register`
    pub fn read_register<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: Register,
    ) -> Result<u32, RegisterError<S::Error>> {
        let device = self.checked_device::<S::Error>(channel)?;

        arbiter.transaction(&self.settings, device, |txn| {
            txn.write_byte(RegisterCommand::read(register).byte())?;
            let mut value = 0u32;
            for _ in 0..register.width() {
                value = (value << 8) | txn.read_byte()? as u32;
            }
            Ok(value)
        })
    }

    /// Send a payload-less command (clear or load)
    pub fn send_command<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        command: RegisterCommand,
    ) -> Result<(), RegisterError<S::Error>> {
        let device = self.checked_device::<S::Error>(channel)?;

        arbiter.transaction(&self.settings, device, |txn| {
            txn.write_byte(command.byte())?;
            Ok(())
        })
    }

    /// Zero `register`
    pub fn clear<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: Register,
    ) -> Result<(), RegisterError<S::Error>> {
        self.send_command(arbiter, channel, RegisterCommand::new(Opcode::Clear, register))
    }

    /// Load into `register` from its source
    pub fn load<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: Register,
    ) -> Result<(), RegisterError<S::Error>> {
        self.send_command(arbiter, channel, RegisterCommand::new(Opcode::Load, register))
    }

    fn checked_device<E>(&self, channel: u8) -> Result<DeviceId, RegisterError<E>> {
        self.device(channel)
            .ok_or(RegisterError::InvalidChannel(channel))
    }
}
