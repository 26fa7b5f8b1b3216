//! Board description of the Tiliqua ECP5 audio platform.

pub mod clocks;
pub mod platform;
pub mod resources;
pub mod units;

pub use clocks::{ClockError, ClockNetwork};
pub use platform::{Platform, PlatformError};
