//! Pulsechain Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits that chip-specific
//! HALs implement. The scheduler in `pulsechain-core` only ever talks to
//! hardware through these traits, so the same scheduling code runs on the
//! RP2040 and against the simulated engine used in host tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  pulsechain-core (scheduler)            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pulsechain-hal (this crate - traits)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ pulsechain-   │       │  simulated    │
//! │ hal-rp2040    │       │  engine       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`pulse::PulseEngine`] - Timed pulse train playback on one output pin

#![no_std]
#![deny(unsafe_code)]

pub mod pulse;

// Re-export key types at crate root for convenience
pub use pulse::{EngineError, EngineLimits, Level, Pulse, PulseEngine, WaveformId};
