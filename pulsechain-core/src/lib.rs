//! Board-agnostic core logic for the exposure scheduler
//!
//! This crate contains everything between the command link and the pulse
//! engine that does not depend on specific hardware:
//!
//! - Timing model (seconds to ticks and back)
//! - Sequence generation (regular and random ON/OFF orderings)
//! - Chain splitting into engine-sized segments
//! - Scheduler state machine with double-buffered segment handoff
//! - Lock-protected scheduler handle and request dispatch
//! - Status line formatting for the display
//! - Device configuration types and parser

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod chain;
pub mod config;
pub mod control;
pub mod error;
pub mod scheduler;
pub mod sequence;
pub mod status;
pub mod timing;
pub mod traits;

pub use error::SchedulerError;
