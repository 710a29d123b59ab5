//! PCF8574A quasi-bidirectional I/O expanders
//!
//! The chip has no registers: a one-byte write sets the port latch and a
//! one-byte read returns the pin levels. The board carries a pair, one
//! wired as eight outputs and one as eight inputs.

use busmux_hal::I2cBus;

/// Output expander address on this board
pub const OUTPUT_ADDRESS: u8 = 0x38;

/// Input expander address on this board
pub const INPUT_ADDRESS: u8 = 0x39;

/// Port width
pub const PORT_BITS: u8 = 8;

/// Expander errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtIoError<E> {
    /// No acknowledge at this address during init
    NotPresent(u8),
    /// Bit number of 8 or more; nothing was sent
    InvalidBit(u8),
    /// Transport error
    I2c(E),
}

/// One expander chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcf8574 {
    address: u8,
}

impl Pcf8574 {
    /// Chip at `address`
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// 7-bit bus address
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// True if the chip acknowledges an address-only write
    pub fn is_present<B: I2cBus>(&self, bus: &mut B) -> bool {
        bus.write(self.address, &[]).is_ok()
    }

    /// Set the port latch
    pub fn write_port<B: I2cBus>(&self, bus: &mut B, value: u8) -> core::result::Result<(), B::Error> {
        bus.write(self.address, &[value])
    }

    /// Sample the pins
    pub fn read_port<B: I2cBus>(&self, bus: &mut B) -> core::result::Result<u8, B::Error> {
        let mut buf = [0u8];
        bus.read(self.address, &mut buf)?;
        Ok(buf[0])
    }
}

/// The output/input expander pair
///
/// Keeps a copy of the last value written to the output chip so single bits
/// can be changed without reading the port back.
#[derive(Debug, Clone, Copy)]
pub struct ExtIo {
    output: Pcf8574,
    input: Pcf8574,
    latch: u8,
}

type Result<T, E> = core::result::Result<T, ExtIoError<E>>;

impl ExtIo {
    /// Expanders at the given output and input addresses
    pub const fn new(output: u8, input: u8) -> Self {
        Self {
            output: Pcf8574::new(output),
            input: Pcf8574::new(input),
            latch: 0,
        }
    }

    /// Check both chips answer and clear every output
    ///
    /// The output chip is cleared whenever it answers, even if the input
    /// chip is then found missing.
    pub fn init<B: I2cBus>(&mut self, bus: &mut B) -> Result<(), B::Error> {
        if !self.output.is_present(bus) {
            return Err(ExtIoError::NotPresent(self.output.address()));
        }
        self.set_output(bus, 0)?;

        if !self.input.is_present(bus) {
            return Err(ExtIoError::NotPresent(self.input.address()));
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "ExtIO: out {=u8:#x}, in {=u8:#x}",
            self.output.address(),
            self.input.address()
        );

        Ok(())
    }

    /// Drive all eight outputs
    pub fn set_output<B: I2cBus>(&mut self, bus: &mut B, value: u8) -> Result<(), B::Error> {
        self.output.write_port(bus, value).map_err(ExtIoError::I2c)?;
        self.latch = value;
        Ok(())
    }

    /// Last value written to the outputs
    pub fn output(&self) -> u8 {
        self.latch
    }

    /// Sample all eight inputs
    pub fn input<B: I2cBus>(&self, bus: &mut B) -> Result<u8, B::Error> {
        self.input.read_port(bus).map_err(ExtIoError::I2c)
    }

    /// Level of input `bit`
    pub fn is_bit_set<B: I2cBus>(&self, bus: &mut B, bit: u8) -> Result<bool, B::Error> {
        let mask = bit_mask(bit)?;
        Ok(self.input(bus)? & mask != 0)
    }

    /// Drive output `bit`, leaving the other outputs as last written
    pub fn set_bit<B: I2cBus>(&mut self, bus: &mut B, bit: u8, on: bool) -> Result<(), B::Error> {
        let mask = bit_mask(bit)?;
        let value = if on {
            self.latch | mask
        } else {
            self.latch & !mask
        };
        self.set_output(bus, value)
    }
}

impl Default for ExtIo {
    fn default() -> Self {
        Self::new(OUTPUT_ADDRESS, INPUT_ADDRESS)
    }
}

fn bit_mask<E>(bit: u8) -> Result<u8, E> {
    if bit < PORT_BITS {
        Ok(1 << bit)
    } else {
        Err(ExtIoError::InvalidBit(bit))
    }
}
