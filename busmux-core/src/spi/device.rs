//! Logical device identifiers

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Decoder output code of one SPI slot
///
/// Values are restricted to 0..=7. Code 7 ([`DeviceId::UNUSED`]) has no chip
/// attached and is what the lines show whenever the bus is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct DeviceId(u8);

impl DeviceId {
    /// DAC, outputs 0 and 1
    pub const DAC01: Self = Self(0);
    /// DAC, outputs 2 and 3
    pub const DAC23: Self = Self(1);
    /// Quadrature counter, channel 0
    pub const QC0: Self = Self(2);
    /// Quadrature counter, channel 1
    pub const QC1: Self = Self(3);
    /// 8-channel ADC
    pub const ADC: Self = Self(4);
    /// External slot 5
    pub const EXT5: Self = Self(5);
    /// External slot 6
    pub const EXT6: Self = Self(6);
    /// Nothing selected
    pub const UNUSED: Self = Self(7);
    /// CAN controller shares the first external slot
    pub const CAN: Self = Self::EXT5;

    /// Highest decoder code
    pub const MAX: u8 = 7;

    /// Build from a raw decoder code; `None` above 7
    pub const fn new(raw: u8) -> Option<Self> {
        if raw > Self::MAX {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw decoder code
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True for code 7
    pub const fn is_unused(self) -> bool {
        self.0 == Self::MAX
    }

    /// Level of select line `line` (0 = least significant bit)
    pub const fn line_level(self, line: usize) -> bool {
        (self.0 >> line) & 1 != 0
    }

    /// Rebuild the id from the three select line levels
    pub const fn from_levels(levels: [bool; 3]) -> Self {
        Self((levels[0] as u8) | ((levels[1] as u8) << 1) | ((levels[2] as u8) << 2))
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::UNUSED
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        Self::new(raw).ok_or(raw)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> u8 {
        id.0
    }
}
