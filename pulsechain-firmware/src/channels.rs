//! Inter-task signals
//!
//! The scheduler itself is shared by reference; these only wake tasks that
//! would otherwise sleep until their next timeout.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Playback was started; wakes the idle playback loop
pub static PLAYBACK_STARTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Scheduler state changed in a way the status row should show at once
pub static STATUS_DIRTY: Signal<CriticalSectionRawMutex, ()> = Signal::new();
