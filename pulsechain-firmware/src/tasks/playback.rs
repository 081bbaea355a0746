//! Playback loop
//!
//! Polls the scheduler so segments are pre-staged and handed off on time,
//! and keeps the PIO FIFO topped up in between.

use defmt::*;
use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};

use pulsechain_core::scheduler::PlaybackEvent;
use pulsechain_core::SchedulerError;

use super::PulseScheduler;
use crate::channels::{PLAYBACK_STARTED, STATUS_DIRTY};

/// Longest sleep while a schedule plays
///
/// Bounds how long the 8-word FIFO goes without a refill.
const SERVICE_PERIOD_US: u64 = 1_000;

/// Boundaries closer than this are polled right away
const SPIN_THRESHOLD_US: u64 = 50;

/// Playback task - drives the shared scheduler
#[embassy_executor::task]
pub async fn playback_task(scheduler: &'static PulseScheduler) {
    info!("Playback task started");

    let mut underruns = 0;

    loop {
        match scheduler.poll() {
            Ok(Some(event)) => {
                log_event(event);
                STATUS_DIRTY.signal(());
            }
            Ok(None) => {}
            Err(SchedulerError::EngineFailure(e)) => {
                // poll() has already stopped playback and parked the pin
                error!("Pulse engine failure, playback stopped: {}", e);
                STATUS_DIRTY.signal(());
            }
            Err(e) => {
                warn!("Poll failed: {}", e);
            }
        }

        let seen = scheduler.lock(|s| s.engine().underruns());
        if seen != underruns {
            warn!("PIO FIFO underrun ({} total)", seen);
            underruns = seen;
        }

        match scheduler.poll_delay_us() {
            Some(delay_us) => {
                let sleep_us = delay_us.min(SERVICE_PERIOD_US);
                if sleep_us < SPIN_THRESHOLD_US {
                    yield_now().await;
                } else {
                    Timer::after(Duration::from_micros(sleep_us)).await;
                }
            }
            None => {
                // Idle until a start request arrives
                PLAYBACK_STARTED.wait().await;
                debug!("Playback woken");
            }
        }
    }
}

fn log_event(event: PlaybackEvent) {
    match event {
        PlaybackEvent::SegmentStaged(index) => debug!("Segment {} staged", index),
        PlaybackEvent::SegmentStarted(index) => info!("Segment {} started", index),
        PlaybackEvent::Finished => info!("Schedule finished"),
    }
}
