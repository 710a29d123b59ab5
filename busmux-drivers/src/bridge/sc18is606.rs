//! SC18IS606 I2C-to-SPI bridge
//!
//! Sits in front of the CAN controller. Every I2C write starts with a
//! function byte: bits 0..2 select slave-select outputs for an SPI
//! transfer, `0xF0..=0xF7` are configuration commands. Data clocked in
//! from MISO is buffered in the chip and fetched with a plain I2C read; the
//! chip NACKs that read until the SPI transfer has finished.
//!
//! GPIO0..2 share pins with SS0..2. The enable, configuration and output
//! registers are write-only, so the driver keeps copies and rewrites a whole
//! register to change one pin.

use busmux_hal::{BitOrder, I2cBus, Mode, OutputPin};
use embedded_hal::delay::DelayNs;

/// Function bytes
pub mod cmd {
    /// SPI clock, bit order and mode
    pub const CONFIGURE_SPI: u8 = 0xF0;
    /// Clear the interrupt output
    pub const CLEAR_INTERRUPT: u8 = 0xF1;
    /// Enter low-power idle
    pub const IDLE: u8 = 0xF2;
    /// Write GPIO output levels
    pub const GPIO_WRITE: u8 = 0xF4;
    /// Latch GPIO input levels into the data buffer
    pub const GPIO_READ: u8 = 0xF5;
    /// Enable pins as GPIO instead of slave selects
    pub const GPIO_ENABLE: u8 = 0xF6;
    /// GPIO pin modes, two bits per pin
    pub const GPIO_CONFIG: u8 = 0xF7;
}

/// Address with A0..A2 tied low
pub const BASE_ADDRESS: u8 = 0x28;

/// Bridge address on this board
pub const DEFAULT_ADDRESS: u8 = BASE_ADDRESS;

/// Slave-select outputs, also the number of GPIO pins
pub const SLAVE_SELECTS: u8 = 3;

/// Chip data buffer size
pub const DATA_BUFFER_DEPTH: usize = 1024;

/// Longest SPI transfer one call frames
pub const MAX_TRANSFER: usize = 64;

/// Reads attempted while the chip is still shifting
pub const READ_RETRIES: u32 = 100;

/// Width of each phase of the reset pulse
pub const RESET_PULSE_MS: u32 = 1;

/// Address for the given A0..A2 strapping
pub const fn address(a0: bool, a1: bool, a2: bool) -> u8 {
    BASE_ADDRESS | (a2 as u8) << 2 | (a1 as u8) << 1 | a0 as u8
}

/// SPI clock derived from the 7.3728 MHz internal oscillator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiClock {
    Khz1843 = 0b00,
    Khz461 = 0b01,
    Khz115 = 0b10,
    Khz58 = 0b11,
}

/// GPIO pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioMode {
    QuasiBidirectional = 0b00,
    PushPull = 0b01,
    InputOnly = 0b10,
    OpenDrain = 0b11,
}

/// Bridge errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError<E> {
    /// GPIO number of 3 or more; nothing was sent
    InvalidPin(u8),
    /// Slave select of 3 or more; nothing was sent
    InvalidSlave(u8),
    /// Transfer longer than [`MAX_TRANSFER`], or a short receive buffer
    InvalidLength(usize),
    /// Read buffer still NACKed after [`READ_RETRIES`] attempts
    Busy,
    /// Transport error
    I2c(E),
}

/// SPI configuration byte: bit order in bit 5, mode in bits 3..2, clock in
/// bits 1..0
pub const fn spi_config(bit_order: BitOrder, mode: Mode, clock: SpiClock) -> u8 {
    let lsb_first: u8 = match bit_order {
        BitOrder::MsbFirst => 0,
        BitOrder::LsbFirst => 1,
    };
    let mode: u8 = match mode {
        Mode::Mode0 => 0,
        Mode::Mode1 => 1,
        Mode::Mode2 => 2,
        Mode::Mode3 => 3,
    };
    lsb_first << 5 | mode << 2 | clock as u8
}

type Result<T, E> = core::result::Result<T, BridgeError<E>>;

/// The bridge chip
#[derive(Debug, Clone, Copy)]
pub struct Sc18is606 {
    address: u8,
    gpio_enable: u8,
    gpio_config: u8,
    gpio_write: u8,
}

impl Sc18is606 {
    /// Bridge at `address`, register copies at their power-up value
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            gpio_enable: 0,
            gpio_config: 0,
            gpio_write: 0,
        }
    }

    /// 7-bit bus address
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Pulse the active-low reset line high, low, high
    ///
    /// The chip comes back with power-up registers, so the copies are reset
    /// too.
    pub fn reset<P: OutputPin, D: DelayNs>(&mut self, reset: &mut P, delay: &mut D) {
        reset.set_high();
        delay.delay_ms(RESET_PULSE_MS);
        reset.set_low();
        delay.delay_ms(RESET_PULSE_MS);
        reset.set_high();
        *self = Self::new(self.address);
    }

    /// Set clock, bit order and mode of the downstream SPI bus
    pub fn configure_spi<B: I2cBus>(
        &self,
        bus: &mut B,
        bit_order: BitOrder,
        mode: Mode,
        clock: SpiClock,
    ) -> Result<(), B::Error> {
        self.command(bus, cmd::CONFIGURE_SPI, &[spi_config(bit_order, mode, clock)])
    }

    /// Use `pin` as GPIO (`true`) or as a slave select
    pub fn enable_gpio<B: I2cBus>(&mut self, bus: &mut B, pin: u8, enable: bool) -> Result<(), B::Error> {
        let mask = pin_mask(pin)?;
        let value = with_bits(self.gpio_enable, mask, enable);
        self.command(bus, cmd::GPIO_ENABLE, &[value])?;
        self.gpio_enable = value;
        Ok(())
    }

    /// Set the drive mode of `pin`
    pub fn configure_gpio<B: I2cBus>(&mut self, bus: &mut B, pin: u8, mode: GpioMode) -> Result<(), B::Error> {
        pin_mask(pin)?;
        let shift = 2 * pin;
        let value = (self.gpio_config & !(0b11 << shift)) | (mode as u8) << shift;
        self.command(bus, cmd::GPIO_CONFIG, &[value])?;
        self.gpio_config = value;
        Ok(())
    }

    /// Drive one GPIO output, keeping the others
    pub fn write_gpio<B: I2cBus>(&mut self, bus: &mut B, pin: u8, high: bool) -> Result<(), B::Error> {
        let mask = pin_mask(pin)?;
        self.write_gpio_bank(bus, with_bits(self.gpio_write, mask, high))
    }

    /// Drive every GPIO output at once
    pub fn write_gpio_bank<B: I2cBus>(&mut self, bus: &mut B, value: u8) -> Result<(), B::Error> {
        self.command(bus, cmd::GPIO_WRITE, &[value])?;
        self.gpio_write = value;
        Ok(())
    }

    /// Level of GPIO `pin`
    pub fn read_gpio<B: I2cBus>(&self, bus: &mut B, pin: u8) -> Result<bool, B::Error> {
        let mask = pin_mask(pin)?;
        self.command(bus, cmd::GPIO_READ, &[])?;
        let mut levels = [0u8];
        self.read_buffer(bus, &mut levels)?;
        Ok(levels[0] & mask != 0)
    }

    /// Enter low-power idle until the next I2C access
    pub fn set_low_power<B: I2cBus>(&self, bus: &mut B) -> Result<(), B::Error> {
        self.command(bus, cmd::IDLE, &[])
    }

    /// Release the interrupt output
    pub fn clear_interrupt<B: I2cBus>(&self, bus: &mut B) -> Result<(), B::Error> {
        self.command(bus, cmd::CLEAR_INTERRUPT, &[])
    }

    /// Full-duplex transfer with slave select `slave` asserted
    ///
    /// `rx` receives `tx.len()` bytes and must be at least that long.
    pub fn transfer<B: I2cBus>(&self, bus: &mut B, slave: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), B::Error> {
        if slave >= SLAVE_SELECTS {
            return Err(BridgeError::InvalidSlave(slave));
        }
        if tx.len() > MAX_TRANSFER || rx.len() < tx.len() {
            return Err(BridgeError::InvalidLength(tx.len()));
        }
        self.command(bus, 1 << slave, tx)?;
        self.read_buffer(bus, &mut rx[..tx.len()])
    }

    /// Exchange one byte with slave `slave`
    pub fn transfer_byte<B: I2cBus>(&self, bus: &mut B, slave: u8, byte: u8) -> Result<u8, B::Error> {
        let mut rx = [0u8];
        self.transfer(bus, slave, &[byte], &mut rx)?;
        Ok(rx[0])
    }

    fn command<B: I2cBus>(&self, bus: &mut B, function: u8, data: &[u8]) -> Result<(), B::Error> {
        let mut frame = [0u8; MAX_TRANSFER + 1];
        let len = data.len().min(MAX_TRANSFER);
        frame[0] = function;
        frame[1..=len].copy_from_slice(&data[..len]);
        bus.write(self.address, &frame[..=len]).map_err(BridgeError::I2c)
    }

    fn read_buffer<B: I2cBus>(&self, bus: &mut B, buf: &mut [u8]) -> Result<(), B::Error> {
        for _ in 0..READ_RETRIES {
            if bus.read(self.address, buf).is_ok() {
                return Ok(());
            }
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("SC18IS606 at {=u8:#x}: no data after {} reads", self.address, READ_RETRIES);

        Err(BridgeError::Busy)
    }
}

impl Default for Sc18is606 {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

fn pin_mask<E>(pin: u8) -> Result<u8, E> {
    if pin < SLAVE_SELECTS {
        Ok(1 << pin)
    } else {
        Err(BridgeError::InvalidPin(pin))
    }
}

const fn with_bits(value: u8, mask: u8, set: bool) -> u8 {
    if set {
        value | mask
    } else {
        value & !mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busmux_core::sim::{I2cDeviceModel, SimClock, SimI2cBus, SimI2cError};
    use core::cell::Cell;

    /// Bridge model: command registers, a MISO buffer that answers with the
    /// inverted MOSI bytes, and a number of NACKed reads after each transfer
    struct Bridge {
        config: Option<u8>,
        gpio_enable: u8,
        gpio_config: u8,
        gpio_write: u8,
        gpio_input: u8,
        idle: bool,
        interrupt_cleared: bool,
        last_slaves: u8,
        mosi: heapless::Vec<u8, MAX_TRANSFER>,
        buffer: heapless::Vec<u8, MAX_TRANSFER>,
        busy_reads: Cell<u32>,
        shift_time: u32,
    }

    impl Bridge {
        fn new() -> Self {
            Self {
                config: None,
                gpio_enable: 0,
                gpio_config: 0,
                gpio_write: 0,
                gpio_input: 0,
                idle: false,
                interrupt_cleared: false,
                last_slaves: 0,
                mosi: heapless::Vec::new(),
                buffer: heapless::Vec::new(),
                busy_reads: Cell::new(0),
                shift_time: 2,
            }
        }
    }

    impl I2cDeviceModel for Bridge {
        fn acknowledges(&self, address: u8) -> bool {
            if address != DEFAULT_ADDRESS {
                return false;
            }
            let busy = self.busy_reads.get();
            if busy > 0 {
                self.busy_reads.set(busy - 1);
                return false;
            }
            true
        }

        fn write(&mut self, _address: u8, data: &[u8]) {
            let Some((&function, payload)) = data.split_first() else {
                return;
            };
            let arg = payload.first().copied().unwrap_or(0);
            match function {
                cmd::CONFIGURE_SPI => self.config = Some(arg),
                cmd::CLEAR_INTERRUPT => self.interrupt_cleared = true,
                cmd::IDLE => self.idle = true,
                cmd::GPIO_WRITE => self.gpio_write = arg,
                cmd::GPIO_READ => {
                    self.buffer.clear();
                    let _ = self.buffer.push(self.gpio_input);
                }
                cmd::GPIO_ENABLE => self.gpio_enable = arg,
                cmd::GPIO_CONFIG => self.gpio_config = arg,
                slaves @ 0x01..=0x07 => {
                    self.last_slaves = slaves;
                    self.mosi = payload.iter().copied().collect();
                    self.buffer = payload.iter().map(|b| !b).collect();
                    self.busy_reads.set(self.shift_time);
                }
                _ => {}
            }
        }

        fn read(&mut self, _address: u8, buf: &mut [u8]) {
            for (slot, byte) in buf.iter_mut().zip(self.buffer.iter()) {
                *slot = *byte;
            }
        }
    }

    struct ResetPin {
        high: bool,
        edges: heapless::Vec<bool, 8>,
    }

    impl OutputPin for ResetPin {
        fn set_high(&mut self) {
            self.high = true;
            let _ = self.edges.push(true);
        }

        fn set_low(&mut self) {
            self.high = false;
            let _ = self.edges.push(false);
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    #[test]
    fn test_address_strapping() {
        assert_eq!(address(false, false, false), 0x28);
        assert_eq!(address(true, false, true), 0x2D);
        assert_eq!(address(true, true, true), 0x2F);
    }

    #[test]
    fn test_spi_config_byte() {
        assert_eq!(spi_config(BitOrder::MsbFirst, Mode::Mode0, SpiClock::Khz1843), 0x00);
        assert_eq!(spi_config(BitOrder::LsbFirst, Mode::Mode3, SpiClock::Khz58), 0b10_1111);
        assert_eq!(spi_config(BitOrder::MsbFirst, Mode::Mode1, SpiClock::Khz461), 0b0101);
    }

    #[test]
    fn test_configure_spi() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let bridge = Sc18is606::default();

        bridge
            .configure_spi(&mut bus, BitOrder::MsbFirst, Mode::Mode0, SpiClock::Khz461)
            .unwrap();
        assert_eq!(bus.model().config, Some(0x01));
    }

    #[test]
    fn test_transfer_waits_for_buffer() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let bridge = Sc18is606::default();

        let mut rx = [0u8; 3];
        bridge.transfer(&mut bus, 1, &[0x03, 0x0E, 0x00], &mut rx).unwrap();
        assert_eq!(rx, [0xFC, 0xF1, 0xFF]);
        assert_eq!(bus.model().last_slaves, 0b010);
        assert_eq!(bus.model().mosi.as_slice(), &[0x03, 0x0E, 0x00]);
        // One write, two NACKed reads, one good read
        assert_eq!(bus.transfers(), 4);

        assert_eq!(bridge.transfer_byte(&mut bus, 0, 0x0F), Ok(0xF0));
        assert_eq!(bus.model().last_slaves, 0b001);
    }

    #[test]
    fn test_transfer_gives_up() {
        let mut bus = SimI2cBus::new(Bridge::new());
        bus.model_mut().shift_time = READ_RETRIES;
        let bridge = Sc18is606::default();

        assert_eq!(bridge.transfer_byte(&mut bus, 2, 0xAA), Err(BridgeError::Busy));
        assert_eq!(bus.transfers(), 1 + READ_RETRIES);
    }

    #[test]
    fn test_transfer_rejects_arguments() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let bridge = Sc18is606::default();

        let long = [0u8; MAX_TRANSFER + 1];
        let mut rx = [0u8; MAX_TRANSFER + 1];
        assert_eq!(
            bridge.transfer(&mut bus, 0, &long, &mut rx),
            Err(BridgeError::InvalidLength(MAX_TRANSFER + 1))
        );
        assert_eq!(
            bridge.transfer(&mut bus, 0, &[1, 2], &mut rx[..1]),
            Err(BridgeError::InvalidLength(2))
        );
        assert_eq!(
            bridge.transfer_byte(&mut bus, 3, 0),
            Err(BridgeError::InvalidSlave(3))
        );
        assert_eq!(bus.transfers(), 0);
    }

    #[test]
    fn test_gpio_registers_keep_other_pins() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let mut bridge = Sc18is606::default();

        bridge.enable_gpio(&mut bus, 0, true).unwrap();
        bridge.enable_gpio(&mut bus, 2, true).unwrap();
        assert_eq!(bus.model().gpio_enable, 0b101);
        bridge.enable_gpio(&mut bus, 0, false).unwrap();
        assert_eq!(bus.model().gpio_enable, 0b100);

        bridge.configure_gpio(&mut bus, 2, GpioMode::PushPull).unwrap();
        bridge.configure_gpio(&mut bus, 0, GpioMode::OpenDrain).unwrap();
        assert_eq!(bus.model().gpio_config, 0b01_00_11);
        bridge.configure_gpio(&mut bus, 0, GpioMode::InputOnly).unwrap();
        assert_eq!(bus.model().gpio_config, 0b01_00_10);

        bridge.write_gpio(&mut bus, 2, true).unwrap();
        bridge.write_gpio(&mut bus, 1, true).unwrap();
        bridge.write_gpio(&mut bus, 2, false).unwrap();
        assert_eq!(bus.model().gpio_write, 0b010);

        bridge.write_gpio_bank(&mut bus, 0b111).unwrap();
        assert_eq!(bus.model().gpio_write, 0b111);
    }

    #[test]
    fn test_read_gpio() {
        let mut bus = SimI2cBus::new(Bridge::new());
        bus.model_mut().gpio_input = 0b100;
        let bridge = Sc18is606::default();

        assert_eq!(bridge.read_gpio(&mut bus, 2), Ok(true));
        assert_eq!(bridge.read_gpio(&mut bus, 0), Ok(false));
    }

    #[test]
    fn test_invalid_pin_no_bus_activity() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let mut bridge = Sc18is606::default();

        assert_eq!(bridge.enable_gpio(&mut bus, 3, true), Err(BridgeError::InvalidPin(3)));
        assert_eq!(
            bridge.configure_gpio(&mut bus, 4, GpioMode::PushPull),
            Err(BridgeError::InvalidPin(4))
        );
        assert_eq!(bridge.write_gpio(&mut bus, 7, true), Err(BridgeError::InvalidPin(7)));
        assert_eq!(bridge.read_gpio(&mut bus, 3), Err(BridgeError::InvalidPin(3)));
        assert_eq!(bus.transfers(), 0);
    }

    #[test]
    fn test_failed_write_keeps_copy() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let mut bridge = Sc18is606::default();
        bridge.write_gpio(&mut bus, 0, true).unwrap();

        let mut other = SimI2cBus::new(Bridge::new());
        other.model_mut().busy_reads.set(1);
        assert_eq!(
            bridge.write_gpio(&mut other, 1, true),
            Err(BridgeError::I2c(SimI2cError::Nack))
        );
        bridge.write_gpio(&mut bus, 2, true).unwrap();
        assert_eq!(bus.model().gpio_write, 0b101);
    }

    #[test]
    fn test_power_commands() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let bridge = Sc18is606::default();

        bridge.clear_interrupt(&mut bus).unwrap();
        bridge.set_low_power(&mut bus).unwrap();
        assert!(bus.model().interrupt_cleared);
        assert!(bus.model().idle);
    }

    #[test]
    fn test_reset_pulse() {
        let mut bus = SimI2cBus::new(Bridge::new());
        let mut bridge = Sc18is606::default();
        bridge.write_gpio_bank(&mut bus, 0b011).unwrap();

        let clock = SimClock::new();
        let mut pin = ResetPin {
            high: false,
            edges: heapless::Vec::new(),
        };
        bridge.reset(&mut pin, &mut clock.delay());

        assert_eq!(pin.edges.as_slice(), &[true, false, true]);
        assert!(pin.is_set_high());
        assert_eq!(clock.now_us(), 2_000);

        // Copies back at power-up value
        bridge.write_gpio(&mut bus, 2, true).unwrap();
        assert_eq!(bus.model().gpio_write, 0b100);
    }
}
