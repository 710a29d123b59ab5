//! 25LCxxx SPI EEPROM
//!
//! Writes are limited to one page per write cycle; a write crossing a page
//! boundary wraps inside the page on the chip, so [`SpiEeprom::write`]
//! splits at boundaries. Every page write is preceded by WREN in its own
//! chip-select cycle and followed by polling WIP.

use busmux_core::spi::{BusArbiter, DeviceId};
use busmux_hal::{OutputPin, SpiBus, TransactionSettings};
use embedded_hal::delay::DelayNs;

use crate::error::DriverError;

/// Instruction set
pub mod op {
    /// Read from the address that follows
    pub const READ: u8 = 0x03;
    /// Write within one page
    pub const WRITE: u8 = 0x02;
    /// Clear the write enable latch
    pub const WRDI: u8 = 0x04;
    /// Set the write enable latch
    pub const WREN: u8 = 0x06;
    /// Read status register
    pub const RDSR: u8 = 0x05;
    /// Write status register
    pub const WRSR: u8 = 0x01;
}

/// Status register bits
pub mod status {
    /// Write in progress
    pub const WIP: u8 = 1 << 0;
    /// Write enable latch
    pub const WEL: u8 = 1 << 1;
}

/// Bus settings (3 MHz, MSB first, mode 0)
pub const SETTINGS: TransactionSettings = TransactionSettings::preset(3_000_000);

/// Interval between WIP polls
pub const POLL_INTERVAL_US: u32 = 100;

/// Longest a write cycle may take before giving up
pub const WRITE_TIMEOUT_US: u32 = 10_000;

/// Size and page size of a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    size: u32,
    page_size: u16,
}

impl Geometry {
    /// 25LC640: 8 KiB, 32-byte pages
    pub const LC640: Self = Self {
        size: 8192,
        page_size: 32,
    };

    /// 25LC256: 32 KiB, 64-byte pages
    pub const LC256: Self = Self {
        size: 32_768,
        page_size: 64,
    };

    /// Custom part with 16-bit addressing
    ///
    /// `None` unless both sizes are powers of two, the page fits in the
    /// part and the part fits a 16-bit address.
    pub const fn new(size: u32, page_size: u16) -> Option<Self> {
        if !size.is_power_of_two()
            || !page_size.is_power_of_two()
            || page_size as u32 > size
            || size > 0x1_0000
        {
            return None;
        }
        Some(Self { size, page_size })
    }

    /// Capacity in bytes
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Bytes per write cycle
    pub const fn page_size(&self) -> u16 {
        self.page_size
    }
}

/// One EEPROM on a decoder slot
#[derive(Debug, Clone, Copy)]
pub struct SpiEeprom {
    device: DeviceId,
    geometry: Geometry,
}

impl SpiEeprom {
    /// EEPROM at decoder slot `device`
    pub const fn new(device: DeviceId, geometry: Geometry) -> Self {
        Self { device, geometry }
    }

    /// Part size and page size
    pub const fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), DriverError<S::Error>> {
        self.check_range(address, buf.len())?;
        arbiter.transaction(&SETTINGS, self.device, |txn| {
            txn.write_byte(op::READ)?;
            txn.write_word(address)?;
            txn.read(buf)?;
            Ok(())
        })
    }

    /// Read one byte
    pub fn read_byte<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        address: u16,
    ) -> Result<u8, DriverError<S::Error>> {
        let mut value = [0u8];
        self.read(arbiter, address, &mut value)?;
        Ok(value[0])
    }

    /// Write `data` starting at `address`, one write cycle per page touched
    pub fn write<S: SpiBus, P: OutputPin, D: DelayNs>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        delay: &mut D,
        address: u16,
        data: &[u8],
    ) -> Result<(), DriverError<S::Error>> {
        self.check_range(address, data.len())?;
        self.write_pages(arbiter, delay, address, data.len(), |i| data[i])
    }

    /// Write one byte unless the cell already holds it
    ///
    /// Returns whether a write cycle was spent.
    pub fn write_byte<S: SpiBus, P: OutputPin, D: DelayNs>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        delay: &mut D,
        address: u16,
        value: u8,
    ) -> Result<bool, DriverError<S::Error>> {
        if self.read_byte(arbiter, address)? == value {
            return Ok(false);
        }
        self.write(arbiter, delay, address, &[value])?;
        Ok(true)
    }

    /// Set `len` bytes from `address` to `value`
    pub fn fill<S: SpiBus, P: OutputPin, D: DelayNs>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        delay: &mut D,
        address: u16,
        value: u8,
        len: usize,
    ) -> Result<(), DriverError<S::Error>> {
        self.check_range(address, len)?;
        self.write_pages(arbiter, delay, address, len, |_| value)
    }

    /// Status register
    pub fn status<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
    ) -> Result<u8, DriverError<S::Error>> {
        arbiter.transaction(&SETTINGS, self.device, |txn| {
            txn.write_byte(op::RDSR)?;
            Ok(txn.read_byte()?)
        })
    }

    /// True while a write cycle is running
    pub fn is_busy<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
    ) -> Result<bool, DriverError<S::Error>> {
        Ok(self.status(arbiter)? & status::WIP != 0)
    }

    fn write_pages<S: SpiBus, P: OutputPin, D: DelayNs>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        delay: &mut D,
        address: u16,
        len: usize,
        byte_at: impl Fn(usize) -> u8,
    ) -> Result<(), DriverError<S::Error>> {
        let page = self.geometry.page_size as usize;
        let mut offset = 0;
        while offset < len {
            let start = address as usize + offset;
            let chunk = (page - start % page).min(len - offset);

            self.command(arbiter, op::WREN)?;
            arbiter.transaction(&SETTINGS, self.device, |txn| {
                txn.write_byte(op::WRITE)?;
                txn.write_word(start as u16)?;
                for i in offset..offset + chunk {
                    txn.write_byte(byte_at(i))?;
                }
                Ok::<(), DriverError<S::Error>>(())
            })?;
            self.wait_ready(arbiter, delay)?;

            offset += chunk;
        }
        Ok(())
    }

    fn command<S: SpiBus, P: OutputPin>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        opcode: u8,
    ) -> Result<(), DriverError<S::Error>> {
        arbiter.transaction(&SETTINGS, self.device, |txn| {
            txn.write_byte(opcode)?;
            Ok(())
        })
    }

    fn wait_ready<S: SpiBus, P: OutputPin, D: DelayNs>(
        &self,
        arbiter: &mut BusArbiter<S, P>,
        delay: &mut D,
    ) -> Result<(), DriverError<S::Error>> {
        let mut waited = 0;
        while self.is_busy(arbiter)? {
            if waited >= WRITE_TIMEOUT_US {
                #[cfg(feature = "defmt")]
                defmt::warn!("EEPROM: write cycle timed out");
                return Err(DriverError::Timeout);
            }
            delay.delay_us(POLL_INTERVAL_US);
            waited += POLL_INTERVAL_US;
        }
        Ok(())
    }

    fn check_range<E>(&self, address: u16, len: usize) -> Result<(), DriverError<E>> {
        let past_end = (address as usize)
            .checked_add(len)
            .map_or(true, |end| end > self.geometry.size as usize);
        if past_end {
            Err(DriverError::OutOfRange)
        } else {
            Ok(())
        }
    }
}

impl Default for SpiEeprom {
    fn default() -> Self {
        Self::new(DeviceId::EXT5, Geometry::LC640)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use busmux_core::sim::{SimClock, SimSpiBoard, SpiDeviceModel};

    /// 25LC640 model with in-page address wrap and a WIP countdown
    struct Chip {
        memory: [u8; 8192],
        status: u8,
        busy_polls: u32,
        stuck: bool,
        index: usize,
        opcode: u8,
        address: u16,
        write_cycles: u32,
    }

    impl Chip {
        fn new() -> Self {
            Self {
                memory: [0xFF; 8192],
                status: 0,
                busy_polls: 0,
                stuck: false,
                index: 0,
                opcode: 0,
                address: 0,
                write_cycles: 0,
            }
        }
    }

    impl SpiDeviceModel for Chip {
        fn select(&mut self, device: DeviceId) {
            if device == DeviceId::EXT5 {
                self.index = 0;
            }
        }

        fn deselect(&mut self, device: DeviceId) {
            if device != DeviceId::EXT5 {
                return;
            }
            match self.opcode {
                op::WREN if self.index == 1 => self.status |= status::WEL,
                op::WRITE if self.index > 3 && self.status & status::WEL != 0 => {
                    self.status &= !status::WEL;
                    self.write_cycles += 1;
                    self.busy_polls = 3;
                }
                _ => {}
            }
            self.opcode = 0;
        }

        fn exchange(&mut self, device: DeviceId, mosi: u8) -> u8 {
            assert_eq!(device, DeviceId::EXT5);
            let index = self.index;
            self.index += 1;
            if index == 0 {
                self.opcode = mosi;
                return 0xFF;
            }
            match (self.opcode, index) {
                (op::RDSR, _) => {
                    let busy = self.stuck || self.busy_polls > 0;
                    self.busy_polls = self.busy_polls.saturating_sub(1);
                    self.status | if busy { status::WIP } else { 0 }
                }
                (op::READ | op::WRITE, 1) => {
                    self.address = (mosi as u16) << 8;
                    0xFF
                }
                (op::READ | op::WRITE, 2) => {
                    self.address |= mosi as u16;
                    0xFF
                }
                (op::READ, _) => {
                    let value = self.memory[self.address as usize % 8192];
                    self.address = self.address.wrapping_add(1);
                    value
                }
                (op::WRITE, _) => {
                    if self.status & status::WEL != 0 {
                        self.memory[self.address as usize % 8192] = mosi;
                        // Wrap within the page like the real part
                        let page = self.address & !31;
                        self.address = page | (self.address.wrapping_add(1) & 31);
                    }
                    0xFF
                }
                _ => 0xFF,
            }
        }
    }

    #[test]
    fn test_geometry() {
        assert_eq!(Geometry::new(8192, 32), Some(Geometry::LC640));
        assert_eq!(Geometry::new(8000, 32), None);
        assert_eq!(Geometry::new(8192, 24), None);
        assert_eq!(Geometry::new(0x2_0000, 256), None);
    }

    #[test]
    fn test_write_split_on_pages() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        let mut data = [0u8; 40];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        eeprom.write(&mut arbiter, &mut delay, 20, &data).unwrap();

        // 20..32 then 32..60
        assert_eq!(board.with_model(|c| c.write_cycles), 2);
        board.with_model(|c| {
            assert_eq!(&c.memory[20..60], &data[..]);
            assert_eq!(c.memory[19], 0xFF);
            assert_eq!(c.memory[60], 0xFF);
        });

        let mut back = [0u8; 40];
        eeprom.read(&mut arbiter, 20, &mut back).unwrap();
        assert_eq!(back, data);
        assert_eq!(board.current(), DeviceId::UNUSED);
        assert_eq!(board.settings().map(|s| s.clock_hz()), Some(3_000_000));
    }

    #[test]
    fn test_wren_before_each_page() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        eeprom.write(&mut arbiter, &mut delay, 30, &[1, 2, 3, 4]).unwrap();

        let sent = board.sent_to(DeviceId::EXT5);
        let wren = sent.iter().filter(|&&b| b == op::WREN).count();
        assert_eq!(wren, 2);
        assert_eq!(&sent[..5], &[op::WREN, op::WRITE, 0x00, 30, 1]);
        // WIP was polled with a delay between polls
        assert!(clock.now_us() >= 3 * POLL_INTERVAL_US as u64);
    }

    #[test]
    fn test_write_byte_skips_unchanged() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        assert_eq!(eeprom.write_byte(&mut arbiter, &mut delay, 100, 0x42), Ok(true));
        assert_eq!(eeprom.write_byte(&mut arbiter, &mut delay, 100, 0x42), Ok(false));
        assert_eq!(board.with_model(|c| c.write_cycles), 1);
        assert_eq!(eeprom.read_byte(&mut arbiter, 100), Ok(0x42));
    }

    #[test]
    fn test_fill() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        eeprom.fill(&mut arbiter, &mut delay, 0, 0x00, 100).unwrap();

        board.with_model(|c| {
            assert!(c.memory[..100].iter().all(|&b| b == 0));
            assert_eq!(c.memory[100], 0xFF);
            assert_eq!(c.write_cycles, 4);
        });
    }

    #[test]
    fn test_out_of_range() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        let mut buf = [0u8; 2];
        assert_eq!(
            eeprom.read(&mut arbiter, 8191, &mut buf),
            Err(DriverError::OutOfRange)
        );
        assert_eq!(
            eeprom.fill(&mut arbiter, &mut delay, 8000, 0, 500),
            Err(DriverError::OutOfRange)
        );
        assert!(board.transcript().is_empty());
        assert_eq!(eeprom.read(&mut arbiter, 8190, &mut buf), Ok(()));
    }

    #[test]
    fn test_length_overflow() {
        let board = SimSpiBoard::new(Chip::new());
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        assert_eq!(
            eeprom.fill(&mut arbiter, &mut delay, 1, 0, usize::MAX),
            Err(DriverError::OutOfRange)
        );
        // would wrap to 0 if truncated to 32 bits
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            eeprom.fill(&mut arbiter, &mut delay, 0, 0, 1usize << 32),
            Err(DriverError::OutOfRange)
        );
        assert!(board.transcript().is_empty());
        board.with_model(|c| assert_eq!(c.write_cycles, 0));
    }

    #[test]
    fn test_write_timeout() {
        let mut chip = Chip::new();
        chip.stuck = true;
        let board = SimSpiBoard::new(chip);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();
        let clock = SimClock::new();
        let mut delay = clock.delay();
        let eeprom = SpiEeprom::default();

        assert_eq!(
            eeprom.write(&mut arbiter, &mut delay, 0, &[1]),
            Err(DriverError::Timeout)
        );
        assert!(clock.now_us() >= WRITE_TIMEOUT_US as u64);
        assert_eq!(board.current(), DeviceId::UNUSED);
    }
}
