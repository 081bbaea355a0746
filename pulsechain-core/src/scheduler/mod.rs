//! Chained waveform scheduler
//!
//! [`Scheduler`] is the state machine; [`SharedScheduler`] wraps it in a
//! blocking mutex so the playback loop, the command link and the status
//! display can all drive it.

pub mod events;
pub mod machine;
pub mod shared;

pub use events::{PlaybackEvent, Progress};
pub use machine::{PlaybackSettings, Scheduler, DEFAULT_MAX_TICKS};
pub use shared::SharedScheduler;
