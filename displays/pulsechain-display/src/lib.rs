//! Status display for Pulsechain
//!
//! This crate provides:
//! - `DisplayBackend` trait for character displays
//! - `StatusBoard`, a set of rotating rows implementing the core
//!   `StatusDisplay` sink
//! - `Hd44780` backend for 16x2 character LCDs in 4-bit mode
//!
//! The board only buffers on `set_row`; the display task calls
//! `StatusBoard::tick` at a fast, fixed rate to rotate and redraw rows.

#![no_std]

pub mod backend;
pub mod board;
pub mod hd44780;

pub use backend::{DisplayBackend, DisplayError};
pub use board::{StatusBoard, BOARD_ROWS, MAX_ROTATING};
pub use hd44780::Hd44780;
