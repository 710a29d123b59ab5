//! UART bridge implementations

pub mod sc16is740;

pub use sc16is740::{LineFormat, Parity, Sc16is740, UartError};
