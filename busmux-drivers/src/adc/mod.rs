//! ADC implementations

pub mod mcp3208;

pub use mcp3208::Mcp3208;
