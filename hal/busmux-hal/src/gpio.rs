//! GPIO pin abstractions
//!
//! Push-pull outputs drive the decoder select lines. Open-drain lines are
//! only ever released (input with pull-up) or pulled low (output low):
//! a shared I2C wire is never driven high.

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// The two modes an open-drain line can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineMode {
    /// Input with pull-up enabled; the line floats high unless someone pulls it
    Released,
    /// Output driving low
    DrivenLow,
}

/// Open-drain line emulated on a GPIO
///
/// The only mode transition available is [`LineMode::Released`] ↔
/// [`LineMode::DrivenLow`]. Implementations must switch to input *before*
/// enabling the output so the pin never glitches high.
pub trait OpenDrainPin {
    /// Switch the line mode
    fn set_mode(&mut self, mode: LineMode);

    /// Sample the wire level (reflects other devices pulling it low)
    fn is_high(&self) -> bool;

    /// Release the line back to the pull-up
    fn release(&mut self) {
        self.set_mode(LineMode::Released);
    }

    /// Pull the line low
    fn pull_low(&mut self) {
        self.set_mode(LineMode::DrivenLow);
    }

    /// Sample the wire level
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}
