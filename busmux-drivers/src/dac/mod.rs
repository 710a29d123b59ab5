//! DAC implementations

pub mod mcp4922;

pub use mcp4922::Mcp4922;
