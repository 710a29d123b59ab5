//! SC16IS740 I2C-to-UART bridge
//!
//! Registers are reached through a `register << 3` sub-address byte. With
//! `LCR.DLE` set, registers 0 and 1 become the baud divisor latches
//! DLL/DLH instead of RHR/THR and IER.

use busmux_core::register::{I2cRegisterError, SubAddressDevice};
use busmux_hal::I2cBus;

/// Register indices
pub mod reg {
    /// Receive holding register (read)
    pub const RHR: u8 = 0x00;
    /// Transmit holding register (write)
    pub const THR: u8 = 0x00;
    /// Interrupt enable
    pub const IER: u8 = 0x01;
    /// FIFO control (write)
    pub const FCR: u8 = 0x02;
    /// Interrupt identification (read)
    pub const IIR: u8 = 0x02;
    /// Line control
    pub const LCR: u8 = 0x03;
    /// Modem control
    pub const MCR: u8 = 0x04;
    /// Line status
    pub const LSR: u8 = 0x05;
    /// Modem status
    pub const MSR: u8 = 0x06;
    /// Scratchpad
    pub const SPR: u8 = 0x07;
    /// Free space in the transmit FIFO
    pub const TXLVL: u8 = 0x08;
    /// Bytes in the receive FIFO
    pub const RXLVL: u8 = 0x09;
    /// Divisor latch low (LCR.DLE set)
    pub const DLL: u8 = 0x00;
    /// Divisor latch high (LCR.DLE set)
    pub const DLH: u8 = 0x01;
}

/// LCR bits
pub mod lcr {
    /// Divisor latch enable
    pub const DLE: u8 = 1 << 7;
    /// Parity forced to the even-parity bit
    pub const FORCE_PARITY: u8 = 1 << 5;
    /// Even parity
    pub const EVEN_PARITY: u8 = 1 << 4;
    /// Parity enable
    pub const PARITY_ENABLE: u8 = 1 << 3;
    /// Two stop bits (1.5 for 5-bit words)
    pub const TWO_STOP_BITS: u8 = 1 << 2;
}

/// LSR bits
pub mod lsr {
    /// Data in the receive FIFO
    pub const DATA_READY: u8 = 1 << 0;
    /// Transmit holding register empty
    pub const THR_EMPTY: u8 = 1 << 5;
}

/// FCR bits
pub mod fcr {
    pub const FIFO_ENABLE: u8 = 1 << 0;
    pub const RESET_RX_FIFO: u8 = 1 << 1;
    pub const RESET_TX_FIFO: u8 = 1 << 2;
}

/// MCR bits
pub mod mcr {
    /// Internal TX to RX loopback
    pub const LOOPBACK: u8 = 1 << 4;
}

/// Default 7-bit address on this board
pub const DEFAULT_ADDRESS: u8 = 0x4D;

/// Crystal frequency
pub const CLOCK_HZ: u32 = 18_432_000;

/// FIFO depth
pub const FIFO_SIZE: u8 = 64;

/// Baud rates the crystal divides cleanly
pub const BAUD_RATES: [u32; 6] = [4800, 9600, 19200, 38400, 57600, 115_200];

/// Baud rate after [`Sc16is740::init`]
pub const DEFAULT_BAUD: u32 = 9600;

/// TXLVL polls before a write gives up
pub const TX_POLL_LIMIT: u32 = 1000;

/// Baud divisor for `baud` (clock / 16 / baud)
pub const fn divisor(baud: u32) -> u16 {
    (CLOCK_HZ / (baud * 16)) as u16
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Word length, parity and stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineFormat {
    /// 5 to 8
    pub data_bits: u8,
    pub parity: Parity,
    pub two_stop_bits: bool,
}

impl LineFormat {
    /// 8 data bits, no parity, 1 stop bit
    pub const N81: Self = Self::new(8, Parity::None, false);
    /// 8 data bits, even parity, 1 stop bit
    pub const E81: Self = Self::new(8, Parity::Even, false);
    /// 7 data bits, even parity, 1 stop bit
    pub const E71: Self = Self::new(7, Parity::Even, false);

    pub const fn new(data_bits: u8, parity: Parity, two_stop_bits: bool) -> Self {
        Self {
            data_bits,
            parity,
            two_stop_bits,
        }
    }

    /// LCR value, `None` for an unsupported word length
    pub const fn lcr(&self) -> Option<u8> {
        if self.data_bits < 5 || self.data_bits > 8 {
            return None;
        }
        let mut value = self.data_bits - 5;
        if self.two_stop_bits {
            value |= lcr::TWO_STOP_BITS;
        }
        value |= match self.parity {
            Parity::None => 0,
            Parity::Odd => lcr::PARITY_ENABLE,
            Parity::Even => lcr::PARITY_ENABLE | lcr::EVEN_PARITY,
        };
        Some(value)
    }
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::N81
    }
}

/// UART bridge errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError<E> {
    /// Scratchpad write/read-back mismatch
    NotPresent,
    /// Baud rate not in [`BAUD_RATES`]; nothing was written
    UnsupportedBaud(u32),
    /// Word length outside 5..=8; nothing was written
    InvalidFormat,
    /// Transmit FIFO stayed full for [`TX_POLL_LIMIT`] polls
    TxFull,
    /// Register access failed
    Register(I2cRegisterError<E>),
}

impl<E> From<I2cRegisterError<E>> for UartError<E> {
    fn from(err: I2cRegisterError<E>) -> Self {
        UartError::Register(err)
    }
}

/// The bridge chip
#[derive(Debug, Clone, Copy)]
pub struct Sc16is740 {
    chip: SubAddressDevice,
}

impl Sc16is740 {
    /// Bridge at `address`
    pub const fn new(address: u8) -> Self {
        Self {
            chip: SubAddressDevice::new(address),
        }
    }

    /// 7-bit bus address
    pub const fn address(&self) -> u8 {
        self.chip.address()
    }

    /// Probe the scratchpad, set 9600 8N1, enable and flush both FIFOs
    pub fn init<B: I2cBus>(&self, bus: &mut B) -> Result<(), UartError<B::Error>> {
        const PROBE: u8 = 0xA5;
        self.chip.write_register(bus, reg::SPR, PROBE)?;
        if self.chip.read_register(bus, reg::SPR)? != PROBE {
            #[cfg(feature = "defmt")]
            defmt::warn!("SC16IS740 at {=u8:#x}: scratchpad mismatch", self.address());
            return Err(UartError::NotPresent);
        }

        self.set_parameters(bus, DEFAULT_BAUD, LineFormat::N81)?;
        self.chip.write_register(
            bus,
            reg::FCR,
            fcr::RESET_TX_FIFO | fcr::RESET_RX_FIFO | fcr::FIFO_ENABLE,
        )?;

        #[cfg(feature = "defmt")]
        defmt::info!("SC16IS740 at {=u8:#x}: {} baud 8N1", self.address(), DEFAULT_BAUD);

        Ok(())
    }

    /// Program the baud divisor and line format
    pub fn set_parameters<B: I2cBus>(
        &self,
        bus: &mut B,
        baud: u32,
        format: LineFormat,
    ) -> Result<(), UartError<B::Error>> {
        if !BAUD_RATES.contains(&baud) {
            return Err(UartError::UnsupportedBaud(baud));
        }
        let line = format.lcr().ok_or(UartError::InvalidFormat)?;
        let [high, low] = divisor(baud).to_be_bytes();

        let current = self.chip.read_register(bus, reg::LCR)?;
        self.chip.write_register(bus, reg::LCR, current | lcr::DLE)?;
        self.chip.write_register(bus, reg::DLH, high)?;
        self.chip.write_register(bus, reg::DLL, low)?;
        // Clearing DLE and setting the format in one write
        self.chip.write_register(bus, reg::LCR, line)?;
        Ok(())
    }

    /// Bytes waiting in the receive FIFO
    pub fn bytes_available<B: I2cBus>(&self, bus: &mut B) -> Result<u8, UartError<B::Error>> {
        Ok(self.chip.read_register(bus, reg::RXLVL)?)
    }

    /// Free space in the transmit FIFO
    pub fn tx_space<B: I2cBus>(&self, bus: &mut B) -> Result<u8, UartError<B::Error>> {
        Ok(self.chip.read_register(bus, reg::TXLVL)?)
    }

    /// Next received byte, `None` if the FIFO is empty
    pub fn read_byte<B: I2cBus>(&self, bus: &mut B) -> Result<Option<u8>, UartError<B::Error>> {
        if self.bytes_available(bus)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.chip.read_register(bus, reg::RHR)?))
    }

    /// Queue one byte, waiting for FIFO space
    pub fn write_byte<B: I2cBus>(&self, bus: &mut B, byte: u8) -> Result<(), UartError<B::Error>> {
        let mut polls = 0;
        while self.tx_space(bus)? == 0 {
            polls += 1;
            if polls >= TX_POLL_LIMIT {
                return Err(UartError::TxFull);
            }
        }
        self.chip.write_register(bus, reg::THR, byte)?;
        Ok(())
    }

    /// Queue every byte of `data`
    pub fn write_all<B: I2cBus>(&self, bus: &mut B, data: &[u8]) -> Result<(), UartError<B::Error>> {
        for &byte in data {
            self.write_byte(bus, byte)?;
        }
        Ok(())
    }

    /// Route TX back into RX inside the chip
    pub fn set_loopback<B: I2cBus>(&self, bus: &mut B, enabled: bool) -> Result<(), UartError<B::Error>> {
        self.chip.modify_register(bus, reg::MCR, |value| {
            if enabled {
                value | mcr::LOOPBACK
            } else {
                value & !mcr::LOOPBACK
            }
        })?;
        Ok(())
    }

    /// Line status register
    pub fn line_status<B: I2cBus>(&self, bus: &mut B) -> Result<u8, UartError<B::Error>> {
        Ok(self.chip.read_register(bus, reg::LSR)?)
    }
}

impl Default for Sc16is740 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}
