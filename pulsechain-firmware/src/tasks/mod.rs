//! Embassy async tasks
//!
//! All tasks share one [`PulseScheduler`] by reference; signals in
//! `channels` only wake sleeping tasks early.

pub mod command;
pub mod playback;
pub mod status;

use embassy_rp::peripherals::PIO0;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use pulsechain_core::scheduler::SharedScheduler;
use pulsechain_hal_rp2040::PioPulseEngine;

use crate::clock::EmbassyClock;

pub use command::command_task;
pub use playback::playback_task;
pub use status::status_task;

/// Every task runs on the thread-mode executor
pub type PulseScheduler =
    SharedScheduler<ThreadModeRawMutex, PioPulseEngine<'static, PIO0, 0>, EmbassyClock>;
