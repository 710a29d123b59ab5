//! busmux firmware
//!
//! Brings up the multiplexed SPI bus and the recovered I2C bus on an
//! RP2040 carrier, initializes the on-board peripherals and runs the
//! sampling tasks.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::I2c;
use embassy_rp::spi::Spi;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use busmux_core::spi::SelectLines;
use busmux_core::{BusArbiter, I2cController};
use busmux_drivers::adc::Mcp3208;
use busmux_drivers::bridge::{Sc18is606, SpiClock};
use busmux_drivers::counter::Ls7366r;
use busmux_drivers::dac::Mcp4922;
use busmux_drivers::extio::ExtIo;
use busmux_drivers::uart::Sc16is740;
use busmux_hal::{BitOrder, Mode, TransactionSettings};
use busmux_hal_rp2040::{i2c, spi, BlockingI2c, BlockingSpi, BusyDelay, OpenDrainLine, SelectLine};

use crate::bus::{SharedI2c, SharedSpi};

mod bus;
mod channels;
mod config;
mod tasks;

static SPI_BUS: StaticCell<SharedSpi> = StaticCell::new();
static I2C_BUS: StaticCell<SharedI2c> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("busmux firmware starting...");

    let mut p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    if let Err(e) = config::BOARD.validate() {
        defmt::panic!("Compiled board config is invalid: {}", e);
    }

    // SPI first: the stored configuration lives on the SPI EEPROM
    let spi_bus = Spi::new_blocking(
        p.SPI0,
        p.PIN_18,
        p.PIN_19,
        p.PIN_20,
        spi::config_for(&TransactionSettings::DEFAULT),
    );
    let lines = SelectLines::new(
        SelectLine::new(p.PIN_16),
        SelectLine::new(p.PIN_17),
        SelectLine::new(p.PIN_15),
    );
    let boot_settings = config::BOARD
        .spi
        .default_settings()
        .unwrap_or(TransactionSettings::DEFAULT);
    let mut arbiter = BusArbiter::with_default_settings(BlockingSpi::new(spi_bus), lines, boot_settings);
    if let Err(e) = arbiter.initialize() {
        warn!("SPI arbiter init failed: {}", e);
    }

    let board = config::load(&mut arbiter, &config::BOARD);

    if let Some(settings) = board.spi.default_settings() {
        if settings != *arbiter.default_settings() {
            let (spi_bus, lines) = arbiter.free();
            arbiter = BusArbiter::with_default_settings(spi_bus, lines, settings);
            if let Err(e) = arbiter.initialize() {
                warn!("SPI arbiter re-init failed: {}", e);
            }
        }
    }

    let counter = Ls7366r::new(board.devices.qc0, board.devices.qc1);
    if let Err(e) = counter.init(&mut arbiter) {
        warn!("LS7366R init failed: {}", e);
    }
    let dac = Mcp4922::new(board.devices.dac01, board.devices.dac23);
    if let Err(e) = dac.init(&mut arbiter) {
        warn!("MCP4922 init failed: {}", e);
    }
    let adc = Mcp3208::new(board.devices.adc);

    info!("SPI bus ready");

    // I2C: clear a hung bus on the raw pins before the peripheral owns them
    let mut controller: bus::I2cBusController = I2cController::new(board.i2c.recovery);
    {
        let mut scl = OpenDrainLine::new(p.PIN_13.reborrow());
        let mut sda = OpenDrainLine::new(p.PIN_12.reborrow());
        let health = controller.recover(&mut scl, &mut sda, &mut BusyDelay);
        info!(
            "I2C recovery: {} ({} pulses)",
            health.message(),
            controller.pulses_issued()
        );
    }

    let i2c_bus = I2c::new_blocking(
        p.I2C0,
        p.PIN_13,
        p.PIN_12,
        i2c::config_for(&board.i2c.bus_config()),
    );
    match controller.attach(BlockingI2c::new(i2c_bus)) {
        Ok(_) => {
            if let Ok(mut session) = controller.bus() {
                let found = session.scan();
                info!("I2C scan: {} device(s) {:x}", found.len(), found.as_slice());

                let mut ext_io = ExtIo::new(board.addresses.ext_out, board.addresses.ext_in);
                if let Err(e) = ext_io.init(&mut session) {
                    warn!("ExtIO init failed: {}", e);
                }

                let can_bridge = Sc18is606::new(board.addresses.spi_bridge);
                if let Err(e) =
                    can_bridge.configure_spi(&mut session, BitOrder::MsbFirst, Mode::Mode0, SpiClock::Khz1843)
                {
                    warn!("CAN bridge config failed: {}", e);
                }
            }
        }
        Err(e) => warn!("I2C bus left unattached: {}", e),
    }

    let uart = Sc16is740::new(board.addresses.uart);

    let spi_shared: &'static SharedSpi = SPI_BUS.init(Mutex::new(arbiter));
    let i2c_shared: &'static SharedI2c = I2C_BUS.init(Mutex::new(controller));

    let led = Output::new(p.PIN_25, Level::Low);

    // Spawn tasks
    spawner.spawn(tasks::heartbeat_task(led)).unwrap();
    spawner.spawn(tasks::counter_task(spi_shared, counter)).unwrap();
    spawner.spawn(tasks::analog_task(spi_shared, adc)).unwrap();
    spawner.spawn(tasks::uart_bridge_task(i2c_shared, uart)).unwrap();
    spawner.spawn(tasks::report_task()).unwrap();

    info!("All tasks spawned, firmware running");
}
