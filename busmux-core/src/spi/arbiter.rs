//! Chip-select arbiter and transaction guard

use busmux_hal::{BitOrder, OutputPin, SpiBus, TransactionSettings};

use super::device::DeviceId;
use super::state::{BusEvent, BusState, BusViolation};

/// Number of decoder select lines
pub const SELECT_LINES: usize = 3;

/// The three GPIO lines feeding the decoder, least significant bit first
pub struct SelectLines<P> {
    lines: [P; SELECT_LINES],
}

impl<P: OutputPin> SelectLines<P> {
    /// Group the decoder inputs A (bit 0), B (bit 1) and C (bit 2)
    pub fn new(bit0: P, bit1: P, bit2: P) -> Self {
        Self {
            lines: [bit0, bit1, bit2],
        }
    }

    /// Drive the binary encoding of `id`, bit 0 first
    pub fn drive(&mut self, id: DeviceId) {
        for (bit, line) in self.lines.iter_mut().enumerate() {
            line.set_state(id.line_level(bit));
        }
    }

    /// Code currently driven
    pub fn current(&self) -> DeviceId {
        DeviceId::from_levels([
            self.lines[0].is_set_high(),
            self.lines[1].is_set_high(),
            self.lines[2].is_set_high(),
        ])
    }

    /// Release the pins
    pub fn free(self) -> [P; SELECT_LINES] {
        self.lines
    }
}

/// Arbiter errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E> {
    /// Transport error from the SPI peripheral
    Spi(E),
    /// `initialize` has not run yet
    NotInitialized,
    /// A transaction is already open
    TransactionInProgress,
    /// No transaction is open
    NoTransaction,
    /// Transfer attempted with nothing selected
    NoDeviceSelected,
    /// Raw decoder code above 7
    InvalidDevice(u8),
}

impl<E> From<BusViolation> for BusError<E> {
    fn from(violation: BusViolation) -> Self {
        match violation {
            BusViolation::TransactionInProgress => BusError::TransactionInProgress,
            BusViolation::NoTransaction => BusError::NoTransaction,
        }
    }
}

/// Owner of the shared SPI bus and the decoder select lines
///
/// Guarantees at most one chip is asserted at any time and that the lines
/// read 7 whenever no [`Transaction`] is alive.
pub struct BusArbiter<S, P> {
    spi: S,
    lines: SelectLines<P>,
    state: BusState,
    default_settings: TransactionSettings,
    active_settings: TransactionSettings,
    initialized: bool,
}

impl<S: SpiBus, P: OutputPin> BusArbiter<S, P> {
    /// Create an arbiter using the 4 MHz / MSB-first / mode 0 bus default
    pub fn new(spi: S, lines: SelectLines<P>) -> Self {
        Self::with_default_settings(spi, lines, TransactionSettings::DEFAULT)
    }

    /// Create an arbiter with explicit bus defaults
    ///
    /// Nothing touches the hardware until [`BusArbiter::initialize`].
    pub fn with_default_settings(
        spi: S,
        lines: SelectLines<P>,
        default_settings: TransactionSettings,
    ) -> Self {
        Self {
            spi,
            lines,
            state: BusState::Idle,
            default_settings,
            active_settings: default_settings,
            initialized: false,
        }
    }

    /// Deselect every chip and apply the default bus settings
    ///
    /// Safe to call from every driver's init; only the first call has an
    /// effect.
    pub fn initialize(&mut self) -> Result<(), BusError<S::Error>> {
        if self.state.in_transaction() {
            return Err(BusError::TransactionInProgress);
        }
        if self.initialized {
            return Ok(());
        }

        self.lines.drive(DeviceId::UNUSED);
        self.spi
            .configure(&self.default_settings)
            .map_err(BusError::Spi)?;
        self.active_settings = self.default_settings;
        self.initialized = true;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "SPI arbiter initialized at {} Hz",
            self.default_settings.clock_hz()
        );

        Ok(())
    }

    /// Check whether `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current arbiter state
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Code currently on the select lines
    pub fn current_selection(&self) -> DeviceId {
        self.lines.current()
    }

    /// Settings applied by the most recent transaction (or `initialize`)
    pub fn active_settings(&self) -> &TransactionSettings {
        &self.active_settings
    }

    /// Bus defaults applied by `initialize`
    pub fn default_settings(&self) -> &TransactionSettings {
        &self.default_settings
    }

    /// Drive code 7
    ///
    /// Outside a transaction this only re-asserts the idle pattern.
    pub fn deselect_device(&mut self) -> Result<(), BusError<S::Error>> {
        let next = self.state.transition(BusEvent::Deselect)?;
        self.lines.drive(DeviceId::UNUSED);
        self.state = next;
        Ok(())
    }

    /// Select by raw decoder code
    ///
    /// Selection normally happens on a [`Transaction`]; with no transaction
    /// open the only accepted code is 7. Codes above 7 are rejected without
    /// touching the lines.
    pub fn select_device(&mut self, raw: u8) -> Result<(), BusError<S::Error>> {
        let id = DeviceId::new(raw).ok_or(BusError::InvalidDevice(raw))?;
        let next = self.state.transition(BusEvent::Select(id))?;
        self.lines.drive(id);
        self.state = next;
        Ok(())
    }

    /// Open a transaction with the given device settings
    ///
    /// The bus is reconfigured from `settings`; the returned guard borrows
    /// both the arbiter and the settings until it is ended or dropped.
    pub fn begin_transaction<'a>(
        &'a mut self,
        settings: &'a TransactionSettings,
    ) -> Result<Transaction<'a, S, P>, BusError<S::Error>> {
        if !self.initialized {
            return Err(BusError::NotInitialized);
        }
        let next = self.state.transition(BusEvent::Begin)?;

        self.spi.configure(settings).map_err(BusError::Spi)?;
        self.active_settings = *settings;
        self.state = next;

        Ok(Transaction {
            arbiter: self,
            settings,
        })
    }

    /// Run `f` with `device` selected inside a fresh transaction
    ///
    /// The bus is back at idle when this returns, whether `f` succeeded or
    /// not.
    pub fn transaction<R, E, F>(
        &mut self,
        settings: &TransactionSettings,
        device: DeviceId,
        f: F,
    ) -> Result<R, E>
    where
        F: FnOnce(&mut Transaction<'_, S, P>) -> Result<R, E>,
        E: From<BusError<S::Error>>,
    {
        let mut txn = self.begin_transaction(settings)?;
        txn.select(device);
        let result = f(&mut txn);
        txn.end();
        result
    }

    /// Release the bus and the select lines
    pub fn free(self) -> (S, SelectLines<P>) {
        (self.spi, self.lines)
    }

    fn finish(&mut self) {
        self.lines.drive(DeviceId::UNUSED);
        self.state = BusState::Idle;
    }
}

/// An open SPI transaction
///
/// Obtained from [`BusArbiter::begin_transaction`]. Ending or dropping it
/// deselects every chip and returns the arbiter to [`BusState::Idle`].
pub struct Transaction<'a, S: SpiBus, P: OutputPin> {
    arbiter: &'a mut BusArbiter<S, P>,
    settings: &'a TransactionSettings,
}

impl<'a, S: SpiBus, P: OutputPin> Transaction<'a, S, P> {
    /// Settings this transaction runs with
    pub fn settings(&self) -> &TransactionSettings {
        self.settings
    }

    /// Arbiter state
    pub fn state(&self) -> BusState {
        self.arbiter.state
    }

    /// Device currently asserted
    pub fn selected(&self) -> Option<DeviceId> {
        self.arbiter.state.selected()
    }

    /// Assert `device` (selecting [`DeviceId::UNUSED`] deselects)
    pub fn select(&mut self, device: DeviceId) {
        self.arbiter.lines.drive(device);
        // An open transaction accepts every code
        self.arbiter.state = if device.is_unused() {
            BusState::InTransaction(DeviceId::UNUSED)
        } else {
            BusState::Selected(device)
        };
    }

    /// Assert a device by raw decoder code
    pub fn select_raw(&mut self, raw: u8) -> Result<(), BusError<S::Error>> {
        let device = DeviceId::new(raw).ok_or(BusError::InvalidDevice(raw))?;
        self.select(device);
        Ok(())
    }

    /// Drive code 7 without closing the transaction
    pub fn deselect(&mut self) {
        self.select(DeviceId::UNUSED);
    }

    /// Exchange one byte
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8, BusError<S::Error>> {
        let mut buf = [byte];
        self.transfer_in_place(&mut buf)?;
        Ok(buf[0])
    }

    /// Send one byte, discarding the reply
    pub fn write_byte(&mut self, byte: u8) -> Result<(), BusError<S::Error>> {
        self.transfer_byte(byte).map(|_| ())
    }

    /// Clock in one byte while sending zero
    pub fn read_byte(&mut self) -> Result<u8, BusError<S::Error>> {
        self.transfer_byte(0)
    }

    /// Exchange a 16-bit word in the transaction's bit order
    ///
    /// MSB-first sends the high byte first.
    pub fn transfer_word(&mut self, word: u16) -> Result<u16, BusError<S::Error>> {
        let order = self.settings.bit_order();
        let mut buf = match order {
            BitOrder::MsbFirst => word.to_be_bytes(),
            BitOrder::LsbFirst => word.to_le_bytes(),
        };
        self.transfer_in_place(&mut buf)?;
        Ok(match order {
            BitOrder::MsbFirst => u16::from_be_bytes(buf),
            BitOrder::LsbFirst => u16::from_le_bytes(buf),
        })
    }

    /// Send a 16-bit word, discarding the reply
    pub fn write_word(&mut self, word: u16) -> Result<(), BusError<S::Error>> {
        self.transfer_word(word).map(|_| ())
    }

    /// Clock in a 16-bit word while sending zero
    pub fn read_word(&mut self) -> Result<u16, BusError<S::Error>> {
        self.transfer_word(0)
    }

    /// Send a byte slice
    pub fn write(&mut self, data: &[u8]) -> Result<(), BusError<S::Error>> {
        self.ensure_selected()?;
        self.arbiter.spi.write(data).map_err(BusError::Spi)
    }

    /// Fill `buf` while sending zeros
    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError<S::Error>> {
        self.ensure_selected()?;
        self.arbiter.spi.read(buf).map_err(BusError::Spi)
    }

    /// Full-duplex exchange in place
    pub fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), BusError<S::Error>> {
        self.ensure_selected()?;
        self.arbiter
            .spi
            .transfer_in_place(data)
            .map_err(BusError::Spi)
    }

    /// Deselect and close the transaction
    pub fn end(self) {
        drop(self);
    }

    fn ensure_selected(&self) -> Result<(), BusError<S::Error>> {
        match self.arbiter.state {
            BusState::Selected(_) => Ok(()),
            _ => Err(BusError::NoDeviceSelected),
        }
    }
}

impl<S: SpiBus, P: OutputPin> Drop for Transaction<'_, S, P> {
    fn drop(&mut self) {
        self.arbiter.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Loopback, SimSpiBoard, SimSpiError, SpiDeviceModel};
    use busmux_hal::Mode;
    use proptest::prelude::*;

    const SLOW: TransactionSettings = TransactionSettings::preset(1_000_000);

    #[test]
    fn test_initialize_drives_unused() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        // Power-up: all lines low, slot 0 decoded
        assert_eq!(board.current(), DeviceId::DAC01);
        assert!(!arbiter.is_initialized());

        arbiter.initialize().unwrap();
        assert!(arbiter.is_initialized());
        assert_eq!(board.current(), DeviceId::UNUSED);
        assert_eq!(board.settings(), Some(TransactionSettings::DEFAULT));
        assert_eq!(board.configure_count(), 1);

        // Second call is a no-op
        arbiter.initialize().unwrap();
        assert_eq!(board.configure_count(), 1);
    }

    #[test]
    fn test_begin_requires_initialize() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        assert!(matches!(
            arbiter.begin_transaction(&SLOW),
            Err(BusError::NotInitialized)
        ));
    }

    #[test]
    fn test_select_encoding() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        for raw in 0..=6 {
            let id = DeviceId::new(raw).unwrap();
            let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
            txn.select(id);
            assert_eq!(board.current(), id);
            assert_eq!(
                board.levels(),
                [raw & 1 != 0, raw & 2 != 0, raw & 4 != 0]
            );
            assert_eq!(txn.selected(), Some(id));
            txn.end();
            assert_eq!(board.current(), DeviceId::UNUSED);
        }
    }

    #[test]
    fn test_select_unused_matches_deselect() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
        txn.select(DeviceId::QC1);
        txn.select(DeviceId::UNUSED);
        let via_select = (board.levels(), txn.state());

        txn.select(DeviceId::QC1);
        txn.deselect();
        let via_deselect = (board.levels(), txn.state());

        assert_eq!(via_select, via_deselect);
        assert_eq!(via_select.0, [true, true, true]);
    }

    #[test]
    fn test_nested_begin_rejected() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
        txn.select(DeviceId::ADC);
        // Leak the guard so the transaction stays open
        core::mem::forget(txn);

        assert!(matches!(
            arbiter.begin_transaction(&SLOW),
            Err(BusError::TransactionInProgress)
        ));
        assert!(matches!(
            arbiter.initialize(),
            Err(BusError::TransactionInProgress)
        ));
    }

    #[test]
    fn test_raw_select() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        assert_eq!(arbiter.select_device(8), Err(BusError::InvalidDevice(8)));
        assert_eq!(arbiter.select_device(3), Err(BusError::NoTransaction));
        assert_eq!(board.current(), DeviceId::UNUSED);
        assert_eq!(arbiter.select_device(7), Ok(()));
        assert_eq!(arbiter.deselect_device(), Ok(()));

        let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
        assert_eq!(txn.select_raw(9), Err(BusError::InvalidDevice(9)));
        assert_eq!(txn.selected(), None);
        assert_eq!(txn.select_raw(2), Ok(()));
        assert_eq!(board.current(), DeviceId::QC0);
    }

    #[test]
    fn test_transfer_requires_selection() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
        assert_eq!(txn.write_byte(0x55), Err(BusError::NoDeviceSelected));
        assert_eq!(txn.read_word(), Err(BusError::NoDeviceSelected));
        txn.end();
        assert!(board.transcript().is_empty());
    }

    #[test]
    fn test_transaction_applies_settings() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        let settings = TransactionSettings::new(10_000_000, BitOrder::MsbFirst, Mode::Mode3).unwrap();
        let txn = arbiter.begin_transaction(&settings).unwrap();
        assert_eq!(txn.settings().clock_hz(), 10_000_000);
        txn.end();

        assert_eq!(board.settings(), Some(settings));
        assert_eq!(arbiter.active_settings(), &settings);
        assert_eq!(arbiter.default_settings(), &TransactionSettings::DEFAULT);
    }

    #[test]
    fn test_drop_returns_idle() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        {
            let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
            txn.select(DeviceId::EXT6);
            txn.write(&[1, 2, 3]).unwrap();
            assert_eq!(board.current(), DeviceId::EXT6);
        }

        assert_eq!(arbiter.state(), BusState::Idle);
        assert_eq!(board.current(), DeviceId::UNUSED);
        assert_eq!(arbiter.current_selection(), DeviceId::UNUSED);
        assert_eq!(board.sent_to(DeviceId::EXT6).as_slice(), &[1, 2, 3]);
    }

    /// Replies with a fixed byte sequence, restarting on every select
    struct Scripted {
        reply: [u8; 2],
        index: usize,
    }

    impl SpiDeviceModel for Scripted {
        fn select(&mut self, _device: DeviceId) {
            self.index = 0;
        }

        fn exchange(&mut self, _device: DeviceId, _mosi: u8) -> u8 {
            let byte = self.reply[self.index % 2];
            self.index += 1;
            byte
        }
    }

    #[test]
    fn test_word_bit_order() {
        let board = SimSpiBoard::new(Scripted {
            reply: [0xAB, 0xCD],
            index: 0,
        });
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        let msb = TransactionSettings::preset(4_000_000);
        let word = arbiter
            .transaction(&msb, DeviceId::DAC01, |txn| {
                txn.write_word(0x1234)?;
                txn.deselect();
                txn.select(DeviceId::DAC01);
                txn.read_word()
            })
            .unwrap();
        assert_eq!(word, 0xABCD);
        assert_eq!(&board.sent_to(DeviceId::DAC01)[..2], &[0x12, 0x34]);

        board.clear_transcript();
        let lsb = TransactionSettings::new(4_000_000, BitOrder::LsbFirst, Mode::Mode0).unwrap();
        let word = arbiter
            .transaction(&lsb, DeviceId::DAC23, |txn| txn.transfer_word(0x1234))
            .unwrap();
        assert_eq!(word, 0xCDAB);
        assert_eq!(board.sent_to(DeviceId::DAC23).as_slice(), &[0x34, 0x12]);
    }

    #[test]
    fn test_transaction_helper_ends_on_error() {
        let board = SimSpiBoard::new(Loopback);
        let mut arbiter = board.arbiter();
        arbiter.initialize().unwrap();

        board.fail_next_transfer();
        let result: Result<u8, BusError<SimSpiError>> =
            arbiter.transaction(&SLOW, DeviceId::ADC, |txn| txn.transfer_byte(0xA5));
        assert_eq!(result, Err(BusError::Spi(SimSpiError::Fault)));
        assert_eq!(arbiter.state(), BusState::Idle);
        assert_eq!(board.current(), DeviceId::UNUSED);

        let echoed = arbiter
            .transaction(&SLOW, DeviceId::ADC, |txn| txn.transfer_byte(0xA5))
            .unwrap();
        assert_eq!(echoed, 0xA5);
        assert_eq!(board.unselected_bytes(), 0);
    }

    proptest! {
        #[test]
        fn prop_any_code_round_trips_through_lines(raw in 0u8..8) {
            let board = SimSpiBoard::new(Loopback);
            let mut arbiter = board.arbiter();
            arbiter.initialize().unwrap();

            let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
            txn.select_raw(raw).unwrap();
            prop_assert_eq!(board.current().raw(), raw);
            txn.end();
            prop_assert_eq!(board.current(), DeviceId::UNUSED);
        }

        #[test]
        fn prop_invalid_codes_rejected(raw in 8u8..=255) {
            let board = SimSpiBoard::new(Loopback);
            let mut arbiter = board.arbiter();
            arbiter.initialize().unwrap();

            let mut txn = arbiter.begin_transaction(&SLOW).unwrap();
            txn.select(DeviceId::QC0);
            prop_assert_eq!(txn.select_raw(raw), Err(BusError::InvalidDevice(raw)));
            prop_assert_eq!(board.current(), DeviceId::QC0);
        }
    }
}
