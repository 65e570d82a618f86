//! Configuration constants for the block engine.

mod constants;

pub use constants::*;
