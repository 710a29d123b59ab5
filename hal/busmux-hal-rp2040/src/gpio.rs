//! GPIO lines

use busmux_hal::{LineMode, OpenDrainPin, OutputPin};
use embassy_rp::gpio::{Flex, Level, Output, Pin, Pull};
use embassy_rp::Peri;

/// One decoder select input
pub struct SelectLine<'d> {
    pin: Output<'d>,
}

impl<'d> SelectLine<'d> {
    /// Configure `pin` as a push-pull output, initially high
    ///
    /// Starting high means three fresh lines already present code 7.
    pub fn new(pin: Peri<'d, impl Pin>) -> Self {
        Self {
            pin: Output::new(pin, Level::High),
        }
    }
}

impl OutputPin for SelectLine<'_> {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// SCL or SDA driven open-drain from a GPIO
///
/// Released is input with the pull-up on; driven low is output low. The
/// output latch is kept low so enabling the output can only pull down.
pub struct OpenDrainLine<'d> {
    pin: Flex<'d>,
}

impl<'d> OpenDrainLine<'d> {
    /// Take `pin` and release it
    pub fn new(pin: Peri<'d, impl Pin>) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_pull(Pull::Up);
        pin.set_as_input();
        pin.set_low();
        Self { pin }
    }
}

impl OpenDrainPin for OpenDrainLine<'_> {
    fn set_mode(&mut self, mode: LineMode) {
        match mode {
            LineMode::Released => self.pin.set_as_input(),
            LineMode::DrivenLow => {
                self.pin.set_low();
                self.pin.set_as_output();
            }
        }
    }

    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}
