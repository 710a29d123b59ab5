//! Command byte encoding

/// Operation in bits 7..6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Zero the register
    Clear = 0,
    /// Clock the register out
    Read = 1,
    /// Clock a new value in
    Write = 2,
    /// Transfer between registers (DTR to CNTR, CNTR to OTR)
    Load = 3,
}

impl Opcode {
    /// Decode the two opcode bits
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Opcode::Clear,
            1 => Opcode::Read,
            2 => Opcode::Write,
            _ => Opcode::Load,
        }
    }

    /// True for operations followed by data bytes
    pub const fn has_payload(self) -> bool {
        matches!(self, Opcode::Read | Opcode::Write)
    }
}

/// Register selector in bits 5..3
///
/// Selectors 0 and 7 address nothing and cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    /// Mode register 0 (1 byte)
    Mdr0 = 1,
    /// Mode register 1 (1 byte)
    Mdr1 = 2,
    /// Data/preset register (4 bytes)
    Dtr = 3,
    /// Counter (4 bytes)
    Cntr = 4,
    /// Output latch (4 bytes)
    Otr = 5,
    /// Status register (1 byte)
    Str = 6,
}

impl Register {
    /// Every addressable register
    pub const ALL: [Register; 6] = [
        Register::Mdr0,
        Register::Mdr1,
        Register::Dtr,
        Register::Cntr,
        Register::Otr,
        Register::Str,
    ];

    /// Decode a 3-bit selector
    pub const fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            1 => Some(Register::Mdr0),
            2 => Some(Register::Mdr1),
            3 => Some(Register::Dtr),
            4 => Some(Register::Cntr),
            5 => Some(Register::Otr),
            6 => Some(Register::Str),
            _ => None,
        }
    }

    /// 3-bit selector
    pub const fn selector(self) -> u8 {
        self as u8
    }

    /// Payload width in bytes
    pub const fn width(self) -> usize {
        match self {
            Register::Dtr | Register::Cntr | Register::Otr => 4,
            Register::Mdr0 | Register::Mdr1 | Register::Str => 1,
        }
    }

    /// Largest value the register holds
    pub const fn mask(self) -> u32 {
        match self.width() {
            4 => u32::MAX,
            _ => 0xFF,
        }
    }
}

/// One command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterCommand {
    /// Operation
    pub opcode: Opcode,
    /// Target register
    pub register: Register,
}

impl RegisterCommand {
    /// Build a command
    pub const fn new(opcode: Opcode, register: Register) -> Self {
        Self { opcode, register }
    }

    /// Zero `register`
    pub const fn clear(register: Register) -> Self {
        Self::new(Opcode::Clear, register)
    }

    /// Read `register`
    pub const fn read(register: Register) -> Self {
        Self::new(Opcode::Read, register)
    }

    /// Write `register`
    pub const fn write(register: Register) -> Self {
        Self::new(Opcode::Write, register)
    }

    /// Load into `register`
    pub const fn load(register: Register) -> Self {
        Self::new(Opcode::Load, register)
    }

    /// Wire encoding: `(opcode << 6) | (register << 3)`
    pub const fn byte(self) -> u8 {
        ((self.opcode as u8) << 6) | (self.register.selector() << 3)
    }

    /// Decode a wire byte
    ///
    /// Fails on a reserved selector or when any of bits 2..0 is set.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte & 0b111 != 0 {
            return None;
        }
        match Register::from_selector((byte >> 3) & 0b111) {
            Some(register) => Some(Self::new(Opcode::from_bits(byte >> 6), register)),
            None => None,
        }
    }
}

impl From<RegisterCommand> for u8 {
    fn from(command: RegisterCommand) -> u8 {
        command.byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(RegisterCommand::write(Register::Mdr0).byte(), 0x88);
        assert_eq!(RegisterCommand::read(Register::Cntr).byte(), 0x60);
        assert_eq!(RegisterCommand::clear(Register::Cntr).byte(), 0x20);
        assert_eq!(RegisterCommand::clear(Register::Str).byte(), 0x30);
        assert_eq!(RegisterCommand::load(Register::Otr).byte(), 0xE8);
        assert_eq!(RegisterCommand::read(Register::Mdr1).byte(), 0x50);
    }

    #[test]
    fn test_widths() {
        assert_eq!(Register::Mdr0.width(), 1);
        assert_eq!(Register::Str.width(), 1);
        assert_eq!(Register::Dtr.width(), 4);
        assert_eq!(Register::Otr.mask(), u32::MAX);
        assert_eq!(Register::Mdr1.mask(), 0xFF);
    }

    #[test]
    fn test_reserved_selectors() {
        assert_eq!(Register::from_selector(0), None);
        assert_eq!(Register::from_selector(7), None);
        assert_eq!(RegisterCommand::from_byte(0x38), None);
        assert_eq!(RegisterCommand::from_byte(0x61), None);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(op in 0u8..4, selector in 1u8..=6) {
            let register = Register::from_selector(selector).unwrap();
            let command = RegisterCommand::new(Opcode::from_bits(op), register);
            prop_assert_eq!(command.byte() & 0b111, 0);
            prop_assert_eq!(RegisterCommand::from_byte(command.byte()), Some(command));
        }
    }
}
