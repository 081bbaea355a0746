//! RP2040-specific HAL for Pulsechain
//!
//! This crate provides the RP2040 implementation of the shared
//! `pulsechain-hal` traits:
//!
//! - PIO program and FIFO word encoding for timed pulse trains
//! - PIO-based pulse engine (implements `pulsechain_hal::PulseEngine`)

#![no_std]

extern crate alloc;

pub mod pio;
pub mod pulse;

pub use pulse::{PioPulseEngine, SLOTS};
