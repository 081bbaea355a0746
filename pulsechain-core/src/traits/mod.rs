//! Capability traits
//!
//! The scheduler and the status reporter see hardware only through these
//! narrow interfaces. The pulse engine trait lives in `pulsechain-hal` and
//! is re-exported here.

pub mod clock;
pub mod display;

pub use clock::Clock;
pub use display::StatusDisplay;
pub use pulsechain_hal::PulseEngine;
