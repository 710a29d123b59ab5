//! Simulated SPI bus behind the 1-of-8 decoder

use core::cell::{Cell, RefCell};

use busmux_hal::{OutputPin, SpiBus, TransactionSettings};
use heapless::Vec;

use crate::register::{Opcode, Register, RegisterCommand};
use crate::spi::{BusArbiter, DeviceId, SelectLines};

/// Exchanges kept in the transcript
pub const TRANSCRIPT_LEN: usize = 512;

/// Behaviour of the chips on the decoder outputs
///
/// One model serves all eight slots; `select`/`deselect` mark chip-select
/// edges. Intermediate codes while the three lines change one by one also
/// produce edges, with no bytes exchanged in between.
pub trait SpiDeviceModel {
    /// Chip select asserted
    fn select(&mut self, _device: DeviceId) {}

    /// Chip select released
    fn deselect(&mut self, _device: DeviceId) {}

    /// One byte clocked while `device` is selected
    fn exchange(&mut self, device: DeviceId, mosi: u8) -> u8;
}

/// Every chip echoes the byte it receives
#[derive(Debug, Clone, Copy, Default)]
pub struct Loopback;

impl SpiDeviceModel for Loopback {
    fn exchange(&mut self, _device: DeviceId, mosi: u8) -> u8 {
        mosi
    }
}

/// One byte on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// Decoded chip select during the byte
    pub device: DeviceId,
    /// Byte sent
    pub mosi: u8,
    /// Byte received
    pub miso: u8,
}

/// Simulated transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimSpiError {
    /// Injected with [`SimSpiBoard::fail_next_transfer`]
    Fault,
}

/// Decoder select lines, SPI bus and chip models in one place
pub struct SimSpiBoard<M> {
    levels: Cell<[bool; 3]>,
    model: RefCell<M>,
    settings: Cell<Option<TransactionSettings>>,
    configure_count: Cell<u32>,
    transcript: RefCell<Vec<Exchange, TRANSCRIPT_LEN>>,
    unselected_bytes: Cell<u32>,
    fail_next: Cell<bool>,
}

impl<M: SpiDeviceModel> SimSpiBoard<M> {
    /// Board at power-up: all select lines low
    pub fn new(model: M) -> Self {
        Self {
            levels: Cell::new([false; 3]),
            model: RefCell::new(model),
            settings: Cell::new(None),
            configure_count: Cell::new(0),
            transcript: RefCell::new(Vec::new()),
            unselected_bytes: Cell::new(0),
            fail_next: Cell::new(false),
        }
    }

    /// Select line `bit` (0 = decoder input A)
    pub fn select_pin(&self, bit: usize) -> SimSelectPin<'_, M> {
        SimSelectPin { board: self, bit }
    }

    /// SPI bus handle
    pub fn spi(&self) -> SimSpi<'_, M> {
        SimSpi { board: self }
    }

    /// Uninitialized arbiter wired to this board
    pub fn arbiter(&self) -> BusArbiter<SimSpi<'_, M>, SimSelectPin<'_, M>> {
        BusArbiter::new(
            self.spi(),
            SelectLines::new(self.select_pin(0), self.select_pin(1), self.select_pin(2)),
        )
    }

    /// Code the decoder currently sees
    pub fn current(&self) -> DeviceId {
        DeviceId::from_levels(self.levels.get())
    }

    /// Raw select line levels, bit 0 first
    pub fn levels(&self) -> [bool; 3] {
        self.levels.get()
    }

    /// Settings of the last `configure`
    pub fn settings(&self) -> Option<TransactionSettings> {
        self.settings.get()
    }

    /// Number of `configure` calls
    pub fn configure_count(&self) -> u32 {
        self.configure_count.get()
    }

    /// Copy of every exchange so far
    pub fn transcript(&self) -> Vec<Exchange, TRANSCRIPT_LEN> {
        self.transcript.borrow().clone()
    }

    /// Bytes sent while `device` was selected
    pub fn sent_to(&self, device: DeviceId) -> Vec<u8, TRANSCRIPT_LEN> {
        self.transcript
            .borrow()
            .iter()
            .filter(|e| e.device == device)
            .map(|e| e.mosi)
            .collect()
    }

    /// Forget the transcript
    pub fn clear_transcript(&self) {
        self.transcript.borrow_mut().clear();
    }

    /// Bytes clocked with code 7 on the lines
    pub fn unselected_bytes(&self) -> u32 {
        self.unselected_bytes.get()
    }

    /// Make the next transfer fail with [`SimSpiError::Fault`]
    pub fn fail_next_transfer(&self) {
        self.fail_next.set(true);
    }

    /// Inspect or modify the chip model
    pub fn with_model<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut self.model.borrow_mut())
    }

    fn set_level(&self, bit: usize, high: bool) {
        let before = self.current();
        let mut levels = self.levels.get();
        levels[bit] = high;
        self.levels.set(levels);
        let after = self.current();

        if before != after {
            let mut model = self.model.borrow_mut();
            if !before.is_unused() {
                model.deselect(before);
            }
            if !after.is_unused() {
                model.select(after);
            }
        }
    }

    fn exchange(&self, mosi: u8) -> u8 {
        let device = self.current();
        let miso = if device.is_unused() {
            self.unselected_bytes.set(self.unselected_bytes.get() + 1);
            // Nobody drives MISO; the pull-up wins
            0xFF
        } else {
            self.model.borrow_mut().exchange(device, mosi)
        };
        // Transcript is best effort once full
        let _ = self.transcript.borrow_mut().push(Exchange { device, mosi, miso });
        miso
    }
}

/// One decoder select line
pub struct SimSelectPin<'a, M> {
    board: &'a SimSpiBoard<M>,
    bit: usize,
}

impl<M: SpiDeviceModel> OutputPin for SimSelectPin<'_, M> {
    fn set_high(&mut self) {
        self.board.set_level(self.bit, true);
    }

    fn set_low(&mut self) {
        self.board.set_level(self.bit, false);
    }

    fn is_set_high(&self) -> bool {
        self.board.levels.get()[self.bit]
    }
}

/// SPI bus handle
pub struct SimSpi<'a, M> {
    board: &'a SimSpiBoard<M>,
}

impl<M: SpiDeviceModel> SpiBus for SimSpi<'_, M> {
    type Error = SimSpiError;

    fn configure(&mut self, settings: &TransactionSettings) -> Result<(), SimSpiError> {
        self.board.settings.set(Some(*settings));
        self.board
            .configure_count
            .set(self.board.configure_count.get() + 1);
        Ok(())
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), SimSpiError> {
        if self.board.fail_next.replace(false) {
            return Err(SimSpiError::Fault);
        }
        for byte in data.iter_mut() {
            *byte = self.board.exchange(*byte);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Command,
    Payload(RegisterCommand, usize),
    Done,
}

/// Opcode/register chips on every slot, each with its own register bank
///
/// Clear zeroes a register; Load copies DTR into CNTR or CNTR into OTR.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    banks: [[u32; 8]; 8],
    frame: Frame,
}

impl RegisterFile {
    /// All registers zero
    pub fn new() -> Self {
        Self {
            banks: [[0; 8]; 8],
            frame: Frame::Command,
        }
    }

    /// Register value on `device`
    pub fn register(&self, device: DeviceId, register: Register) -> u32 {
        self.banks[device.raw() as usize][register.selector() as usize]
    }

    /// Set a register as if the chip had changed it
    pub fn set_register(&mut self, device: DeviceId, register: Register, value: u32) {
        self.banks[device.raw() as usize][register.selector() as usize] = value & register.mask();
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiDeviceModel for RegisterFile {
    fn select(&mut self, _device: DeviceId) {
        self.frame = Frame::Command;
    }

    fn deselect(&mut self, _device: DeviceId) {
        self.frame = Frame::Command;
    }

    fn exchange(&mut self, device: DeviceId, mosi: u8) -> u8 {
        let bank = &mut self.banks[device.raw() as usize];
        match self.frame {
            Frame::Command => {
                let Some(command) = RegisterCommand::from_byte(mosi) else {
                    self.frame = Frame::Done;
                    return 0;
                };
                let reg = command.register.selector() as usize;
                self.frame = match command.opcode {
                    Opcode::Clear => {
                        bank[reg] = 0;
                        Frame::Done
                    }
                    Opcode::Load => {
                        match command.register {
                            Register::Cntr => bank[reg] = bank[Register::Dtr.selector() as usize],
                            Register::Otr => bank[reg] = bank[Register::Cntr.selector() as usize],
                            _ => {}
                        }
                        Frame::Done
                    }
                    Opcode::Write => {
                        bank[reg] = 0;
                        Frame::Payload(command, 0)
                    }
                    Opcode::Read => Frame::Payload(command, 0),
                };
                0
            }
            Frame::Payload(command, index) if index < command.register.width() => {
                let register = command.register;
                let reg = register.selector() as usize;
                let width = register.width();
                self.frame = Frame::Payload(command, index + 1);
                match command.opcode {
                    Opcode::Write => {
                        bank[reg] = ((bank[reg] << 8) | mosi as u32) & register.mask();
                        0
                    }
                    _ => (bank[reg] >> (8 * (width - 1 - index))) as u8,
                }
            }
            _ => 0,
        }
    }
}
