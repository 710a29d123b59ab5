//! Bit-banged bus-clear sequence

use busmux_hal::OpenDrainPin;
use embedded_hal::delay::DelayNs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::health::I2cBusHealth;

/// Shortest settle time after releasing the lines
pub const MIN_SETTLE_MS: u32 = 10;

/// Shortest SCL/SDA low or high phase
pub const MIN_HALF_PERIOD_US: u32 = 5;

/// Recovery timing and budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoveryTiming {
    /// Wait after releasing both lines before the first sample
    pub settle_ms: u32,
    /// SCL low phase of one pulse
    pub pulse_low_us: u32,
    /// SCL released phase of one pulse
    pub pulse_high_us: u32,
    /// Pulses allowed before giving up on SDA
    pub max_pulses: u16,
    /// Wait between SCL samples while a slave stretches the clock
    pub stretch_poll_ms: u32,
    /// SCL samples before declaring a stuck slave
    pub stretch_polls: u16,
    /// SDA low and release phases of the closing STOP
    pub stop_hold_us: u32,
}

impl RecoveryTiming {
    /// 100 ms settle, 20 µs phases, 40 pulses, 20 x 100 ms stretch window
    pub const DEFAULT: Self = Self {
        settle_ms: 100,
        pulse_low_us: 20,
        pulse_high_us: 20,
        max_pulses: 40,
        stretch_poll_ms: 100,
        stretch_polls: 20,
        stop_hold_us: 20,
    };

    /// Raise every wait to its hardware floor
    pub fn sanitized(self) -> Self {
        Self {
            settle_ms: self.settle_ms.max(MIN_SETTLE_MS),
            pulse_low_us: self.pulse_low_us.max(MIN_HALF_PERIOD_US),
            pulse_high_us: self.pulse_high_us.max(MIN_HALF_PERIOD_US),
            stop_hold_us: self.stop_hold_us.max(MIN_HALF_PERIOD_US),
            ..self
        }
    }

    /// Longest a slave may stretch the clock after one pulse
    pub fn stretch_timeout_ms(&self) -> u32 {
        self.stretch_poll_ms.saturating_mul(self.stretch_polls as u32)
    }
}

impl Default for RecoveryTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bus-clear state machine
///
/// Both lines are only ever released or pulled low. Every exit path leaves
/// both lines released.
#[derive(Debug, Clone)]
pub struct BusRecovery {
    timing: RecoveryTiming,
    pulses_issued: u32,
}

impl BusRecovery {
    /// Create with `timing` raised to the hardware floors
    pub fn new(timing: RecoveryTiming) -> Self {
        Self {
            timing: timing.sanitized(),
            pulses_issued: 0,
        }
    }

    /// Effective timing
    pub fn timing(&self) -> &RecoveryTiming {
        &self.timing
    }

    /// SCL pulses issued across all attempts
    pub fn pulses_issued(&self) -> u32 {
        self.pulses_issued
    }

    /// Run one recovery attempt
    pub fn recover<C, D, T>(&mut self, scl: &mut C, sda: &mut D, delay: &mut T) -> I2cBusHealth
    where
        C: OpenDrainPin,
        D: OpenDrainPin,
        T: DelayNs,
    {
        let timing = self.timing;

        sda.release();
        scl.release();
        delay.delay_ms(timing.settle_ms);

        if scl.is_low() {
            #[cfg(feature = "defmt")]
            defmt::warn!("I2C recovery: SCL held low");
            return I2cBusHealth::ErrClockLineLow;
        }
        if sda.is_high() {
            return I2cBusHealth::Ok;
        }

        let mut sda_low = true;
        let mut budget = timing.max_pulses;
        while sda_low && budget > 0 {
            budget -= 1;

            scl.pull_low();
            delay.delay_us(timing.pulse_low_us);
            scl.release();
            delay.delay_us(timing.pulse_high_us);
            self.pulses_issued = self.pulses_issued.saturating_add(1);

            // Slave may stretch the clock
            let mut polls = timing.stretch_polls;
            let mut scl_low = scl.is_low();
            while scl_low && polls > 0 {
                polls -= 1;
                delay.delay_ms(timing.stretch_poll_ms);
                scl_low = scl.is_low();
            }
            if scl_low {
                release_both(scl, sda);
                #[cfg(feature = "defmt")]
                defmt::warn!("I2C recovery: slave holding SCL");
                return I2cBusHealth::ErrClockLineLowSlaveStretch;
            }

            sda_low = sda.is_low();
        }

        if sda_low {
            release_both(scl, sda);
            #[cfg(feature = "defmt")]
            defmt::warn!("I2C recovery: SDA still low after {} pulses", timing.max_pulses);
            return I2cBusHealth::ErrDataLineLow;
        }

        // STOP: SDA low then released while SCL is high
        sda.pull_low();
        delay.delay_us(timing.stop_hold_us);
        sda.release();
        delay.delay_us(timing.stop_hold_us);
        release_both(scl, sda);

        #[cfg(feature = "defmt")]
        defmt::info!("I2C bus repaired after {} pulses", timing.max_pulses - budget);

        I2cBusHealth::Repaired
    }
}

impl Default for BusRecovery {
    fn default() -> Self {
        Self::new(RecoveryTiming::DEFAULT)
    }
}

fn release_both<C: OpenDrainPin, D: OpenDrainPin>(scl: &mut C, sda: &mut D) {
    scl.release();
    sda.release();
}
