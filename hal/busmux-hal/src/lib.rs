//! busmux Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the bus core is
//! written against. Chip-specific HALs (RP2040, host mocks, ...) implement
//! them so the arbitration and recovery logic stays board-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Drivers (busmux-drivers, firmware)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  busmux-core (arbiter, recovery, regs)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  busmux-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  busmux-hal-  │       │ embedded-hal  │
//! │    rp2040     │       │   adapters    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital output (decoder select lines)
//! - [`gpio::OpenDrainPin`] - Released / driven-low line used for I2C recovery
//! - [`spi::SpiBus`] - SPI bus operations, reconfigured per transaction
//! - [`i2c::I2cBus`] - I2C bus operations

#![no_std]
#![deny(unsafe_code)]

pub mod adapters;
pub mod gpio;
pub mod i2c;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use gpio::{LineMode, OpenDrainPin, OutputPin};
pub use i2c::{I2cBus, I2cConfig};
pub use spi::{BitOrder, Mode, SpiBus, TransactionSettings};
