//! Arbiter state machine
//!
//! Bus state is a pure function of the previous state and a bracketing
//! event; the arbiter only drives hardware after a transition succeeds.

use super::device::DeviceId;

/// Arbiter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// No transaction open, lines at 7
    #[default]
    Idle,
    /// A device is asserted inside an open transaction
    Selected(DeviceId),
    /// Transaction open; the id is what the lines show (7 until a select)
    InTransaction(DeviceId),
}

/// Bracketing events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// `begin_transaction`
    Begin,
    /// Drive a decoder code
    Select(DeviceId),
    /// Drive code 7
    Deselect,
    /// `end_transaction`
    End,
}

/// Illegal bracketing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusViolation {
    /// Begin while a transaction is already open
    TransactionInProgress,
    /// Select or end with no transaction open
    NoTransaction,
}

impl BusState {
    /// True while a transaction is open
    pub fn in_transaction(&self) -> bool {
        !matches!(self, BusState::Idle)
    }

    /// Device currently asserted, if any
    pub fn selected(&self) -> Option<DeviceId> {
        match self {
            BusState::Selected(id) => Some(*id),
            _ => None,
        }
    }

    /// Decoder code the lines show in this state
    pub fn lines(&self) -> DeviceId {
        match self {
            BusState::Idle => DeviceId::UNUSED,
            BusState::Selected(id) | BusState::InTransaction(id) => *id,
        }
    }

    /// Process an event and return the next state
    pub fn transition(self, event: BusEvent) -> Result<Self, BusViolation> {
        use BusEvent::*;
        use BusState::*;

        match (self, event) {
            (Idle, Begin) => Ok(InTransaction(DeviceId::UNUSED)),
            (_, Begin) => Err(BusViolation::TransactionInProgress),

            (Idle, Select(id)) if id.is_unused() => Ok(Idle),
            (Idle, Select(_)) => Err(BusViolation::NoTransaction),
            (_, Select(id)) if id.is_unused() => Ok(InTransaction(DeviceId::UNUSED)),
            (_, Select(id)) => Ok(Selected(id)),

            // Deselecting an idle bus re-drives 7 and is always allowed
            (Idle, Deselect) => Ok(Idle),
            (_, Deselect) => Ok(InTransaction(DeviceId::UNUSED)),

            (Idle, End) => Err(BusViolation::NoTransaction),
            (_, End) => Ok(Idle),
        }
    }
}
