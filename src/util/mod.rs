//! Utility types shared by the codec and the scene mapper.
//!
//! - [`Error`] / [`Result`] - fatal error handling
//! - [`Warning`] - recoverable conditions
//! - Math type re-exports from glam

mod error;
mod math;
mod warning;

pub use error::*;
pub use math::*;
pub use warning::*;
