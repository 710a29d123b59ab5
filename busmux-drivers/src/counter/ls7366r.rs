//! LS7366R 32-bit quadrature counter (SPI)
//!
//! Two counters sit on decoder slots QC0 and QC1. Each is driven through
//! opcode/register command bytes; see [`busmux_core::register`].
//!
//! # Registers
//!
//! - MDR0: quadrature mode, count mode, index handling, filter clock
//! - MDR1: counter width, count enable, flag outputs
//! - DTR: preset value loaded into CNTR
//! - CNTR: the counter
//! - OTR: snapshot of CNTR
//! - STR: status flags

use busmux_core::register::{Register, RegisterDevice, RegisterError};
use busmux_core::spi::{BusArbiter, DeviceId};
use busmux_hal::{OutputPin, SpiBus, TransactionSettings};

/// MDR0 fields
pub mod mdr0 {
    /// Non-quadrature count mode (A = clock, B = direction)
    pub const NON_QUADRATURE: u8 = 0b00;
    /// x1 quadrature
    pub const QUADRATURE_X1: u8 = 0b01;
    /// x2 quadrature
    pub const QUADRATURE_X2: u8 = 0b10;
    /// x4 quadrature
    pub const QUADRATURE_X4: u8 = 0b11;

    /// Free-running count
    pub const FREE_RUNNING: u8 = 0b00 << 2;
    /// Single-cycle count
    pub const SINGLE_CYCLE: u8 = 0b01 << 2;
    /// Range-limit count (DTR is the limit)
    pub const RANGE_LIMIT: u8 = 0b10 << 2;
    /// Modulo-N count (N = DTR + 1)
    pub const MODULO_N: u8 = 0b11 << 2;

    /// Index input ignored
    pub const INDEX_DISABLED: u8 = 0b00 << 4;
    /// Index loads CNTR from DTR
    pub const INDEX_LOAD_CNTR: u8 = 0b01 << 4;
    /// Index clears CNTR
    pub const INDEX_RESET_CNTR: u8 = 0b10 << 4;
    /// Index loads OTR from CNTR
    pub const INDEX_LOAD_OTR: u8 = 0b11 << 4;

    /// Asynchronous index
    pub const INDEX_ASYNC: u8 = 0;
    /// Synchronous index (quadrature modes only)
    pub const INDEX_SYNC: u8 = 1 << 6;

    /// Filter clock division factor 1
    pub const FILTER_DIV_1: u8 = 0;
    /// Filter clock division factor 2
    pub const FILTER_DIV_2: u8 = 1 << 7;
}

/// MDR1 fields
pub mod mdr1 {
    /// 4-byte counter
    pub const BYTES_4: u8 = 0b00;
    /// 3-byte counter
    pub const BYTES_3: u8 = 0b01;
    /// 2-byte counter
    pub const BYTES_2: u8 = 0b10;
    /// 1-byte counter
    pub const BYTES_1: u8 = 0b11;

    /// Counting disabled
    pub const COUNT_DISABLE: u8 = 1 << 2;

    /// Flag on index
    pub const FLAG_ON_INDEX: u8 = 1 << 4;
    /// Flag on CNTR = DTR
    pub const FLAG_ON_COMPARE: u8 = 1 << 5;
    /// Flag on borrow
    pub const FLAG_ON_BORROW: u8 = 1 << 6;
    /// Flag on carry
    pub const FLAG_ON_CARRY: u8 = 1 << 7;
}

/// MDR0 applied by [`Ls7366r::init`]: x1 quadrature, free-running, index
/// clears the counter asynchronously, filter clock / 2
pub const DEFAULT_MDR0: u8 = mdr0::QUADRATURE_X1
    | mdr0::FREE_RUNNING
    | mdr0::INDEX_RESET_CNTR
    | mdr0::INDEX_ASYNC
    | mdr0::FILTER_DIV_2;

/// Bus settings (4 MHz, MSB first, mode 0)
pub const SETTINGS: TransactionSettings = TransactionSettings::preset(4_000_000);

/// Number of counter channels
pub const CHANNELS: u8 = 2;

/// The two mode registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeRegister {
    /// Quadrature mode, count mode, index function
    Mdr0,
    /// Counter width and enable
    Mdr1,
}

impl From<ModeRegister> for Register {
    fn from(mode: ModeRegister) -> Register {
        match mode {
            ModeRegister::Mdr0 => Register::Mdr0,
            ModeRegister::Mdr1 => Register::Mdr1,
        }
    }
}

/// STR contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    /// Carry latch (CNTR overflow)
    pub const CARRY: u8 = 1 << 7;
    /// Borrow latch (CNTR underflow)
    pub const BORROW: u8 = 1 << 6;
    /// Compare latch (CNTR = DTR)
    pub const COMPARE: u8 = 1 << 5;
    /// Index latch
    pub const INDEX: u8 = 1 << 4;
    /// Count enabled
    pub const ENABLED: u8 = 1 << 3;
    /// Power loss latch
    pub const POWER_LOSS: u8 = 1 << 2;
    /// Counting up
    pub const COUNT_UP: u8 = 1 << 1;
    /// Sign of CNTR
    pub const NEGATIVE: u8 = 1 << 0;

    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Counter overflowed
    pub fn carry(self) -> bool {
        self.has(Self::CARRY)
    }

    /// Counter underflowed
    pub fn borrow(self) -> bool {
        self.has(Self::BORROW)
    }

    /// Counter matched DTR
    pub fn compare(self) -> bool {
        self.has(Self::COMPARE)
    }

    /// Index input was seen
    pub fn index(self) -> bool {
        self.has(Self::INDEX)
    }

    /// Counting is enabled
    pub fn enabled(self) -> bool {
        self.has(Self::ENABLED)
    }

    /// Power was lost since the last clear
    pub fn power_loss(self) -> bool {
        self.has(Self::POWER_LOSS)
    }

    /// Last count went up
    pub fn counting_up(self) -> bool {
        self.has(Self::COUNT_UP)
    }

    /// Counter is negative
    pub fn negative(self) -> bool {
        self.has(Self::NEGATIVE)
    }
}

/// Both counters
#[derive(Debug, Clone, Copy)]
pub struct Ls7366r {
    regs: RegisterDevice<{ CHANNELS as usize }>,
}

type Result<T, E> = core::result::Result<T, RegisterError<E>>;

impl Ls7366r {
    /// Counters on the given decoder slots
    pub const fn new(channel0: DeviceId, channel1: DeviceId) -> Self {
        Self {
            regs: RegisterDevice::new([channel0, channel1], SETTINGS),
        }
    }

    /// Highest channel
    pub const fn max_channel(&self) -> u8 {
        self.regs.max_channel()
    }

    /// Bring both counters to a known state: [`DEFAULT_MDR0`], counting
    /// disabled, CNTR zero
    pub fn init<S: SpiBus, P: OutputPin>(&self, arbiter: &mut BusArbiter<S, P>) -> Result<(), S::Error> {
        arbiter.initialize()?;
        for channel in 0..CHANNELS {
            self.write_mode(arbiter, channel, ModeRegister::Mdr0, DEFAULT_MDR0)?;
            self.disable_counter(arbiter, channel)?;
            self.clear_count(arbiter, channel)?;
        }

        #[cfg(feature = "defmt")]
        defmt::info!("LS7366R: {} channels initialized", CHANNELS);

        Ok(())
    }

    /// Write MDR0 or MDR1
    pub fn write_mode<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: ModeRegister,
        value: u8,
    ) -> Result<(), S::Error> {
        self.regs
            .write_register(arbiter, channel, register.into(), value as u32)
    }

    /// Read MDR0 or MDR1
    pub fn read_mode<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: ModeRegister,
    ) -> Result<u8, S::Error> {
        Ok(self.regs.read_register(arbiter, channel, register.into())? as u8)
    }

    /// Zero MDR0 or MDR1
    pub fn clear_mode<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        register: ModeRegister,
    ) -> Result<(), S::Error> {
        self.regs.clear(arbiter, channel, register.into())
    }

    /// Zero CNTR
    pub fn clear_count<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        self.regs.clear(arbiter, channel, Register::Cntr)
    }

    /// Read CNTR as a signed count
    pub fn read_count<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<i32, S::Error> {
        Ok(self.regs.read_register(arbiter, channel, Register::Cntr)? as i32)
    }

    /// Write DTR
    pub fn write_data<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
        value: i32,
    ) -> Result<(), S::Error> {
        self.regs
            .write_register(arbiter, channel, Register::Dtr, value as u32)
    }

    /// Copy DTR into CNTR
    pub fn load_count_from_data<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        self.regs.load(arbiter, channel, Register::Cntr)
    }

    /// Latch CNTR into OTR
    pub fn load_output_from_count<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        self.regs.load(arbiter, channel, Register::Otr)
    }

    /// Read OTR as a signed count
    pub fn read_output<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<i32, S::Error> {
        Ok(self.regs.read_register(arbiter, channel, Register::Otr)? as i32)
    }

    /// Reset the STR latches
    pub fn clear_status<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        self.regs.clear(arbiter, channel, Register::Str)
    }

    /// Read STR
    pub fn read_status<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<Status, S::Error> {
        Ok(Status(
            self.regs.read_register(arbiter, channel, Register::Str)? as u8,
        ))
    }

    /// True if the index latch is set
    pub fn is_index_set<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<bool, S::Error> {
        Ok(self.read_status(arbiter, channel)?.index())
    }

    /// Clear MDR1 COUNT_DISABLE, keeping the other MDR1 bits
    pub fn enable_counter<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        let mdr1 = self.read_mode(arbiter, channel, ModeRegister::Mdr1)?;
        self.write_mode(arbiter, channel, ModeRegister::Mdr1, mdr1 & !mdr1::COUNT_DISABLE)
    }

    /// Set MDR1 COUNT_DISABLE, keeping the other MDR1 bits
    pub fn disable_counter<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        channel: u8,
    ) -> Result<(), S::Error> {
        let mdr1 = self.read_mode(arbiter, channel, ModeRegister::Mdr1)?;
        self.write_mode(arbiter, channel, ModeRegister::Mdr1, mdr1 | mdr1::COUNT_DISABLE)
    }
}

impl Default for Ls7366r {
    fn default() -> Self {
        Self::new(DeviceId::QC0, DeviceId::QC1)
    }
}
