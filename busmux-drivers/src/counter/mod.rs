//! Quadrature counter implementations

pub mod ls7366r;

pub use ls7366r::{Ls7366r, ModeRegister, Status};
