//! Core types for the dispatcher.
//!
//! Error taxonomy, fixed constants and the capability traits every other
//! module builds on. Nothing in here performs I/O.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
