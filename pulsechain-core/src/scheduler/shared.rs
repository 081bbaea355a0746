//! Lock-protected scheduler handle
//!
//! Every operation runs inside one critical section of an embassy-sync
//! blocking mutex, so readers never see a half-applied handoff (a new
//! `chain_index` with a stale segment start, say). Sequence generation is
//! the one step kept outside it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use pulsechain_hal::PulseEngine;
use pulsechain_protocol::{SequencePage, SequencePolicy};
use rand::Rng;

use super::events::{PlaybackEvent, Progress};
use super::machine::Scheduler;
use crate::error::SchedulerError;
use crate::sequence::Sequence;
use crate::timing::Timing;
use crate::traits::Clock;

/// Scheduler shared between tasks
///
/// `M` picks the raw mutex: `ThreadModeRawMutex` when every user runs on
/// the thread-mode executor, `CriticalSectionRawMutex` otherwise.
pub struct SharedScheduler<M: RawMutex, E, C> {
    inner: Mutex<M, RefCell<Scheduler<E, C>>>,
}

impl<M: RawMutex, E: PulseEngine, C: Clock> SharedScheduler<M, E, C> {
    pub fn new(scheduler: Scheduler<E, C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(scheduler)),
        }
    }

    /// Run a closure with exclusive access to the scheduler
    ///
    /// The closure must not call back into this handle.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Scheduler<E, C>) -> R) -> R {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn stage_timing(
        &self,
        total_s: f64,
        exposure_fraction: f64,
        resolution_s: f64,
    ) -> Result<(), SchedulerError> {
        self.lock(|s| s.stage_timing(total_s, exposure_fraction, resolution_s))
    }

    /// Generate and stage a sequence
    ///
    /// The sequence is built outside the lock so playback keeps being
    /// serviced meanwhile. It is only staged if the timing it was built for
    /// is still the staged one; otherwise this fails with
    /// [`SchedulerError::InvalidSequence`].
    pub fn stage_sequence<R: Rng + ?Sized>(
        &self,
        policy: SequencePolicy,
        rng: &mut R,
    ) -> Result<(), SchedulerError> {
        let timing = self.lock(|s| s.sequence_target())?;
        let sequence = Sequence::generate(policy, &timing, rng)?;
        self.lock(|s| s.install_sequence(&timing, sequence))
    }

    pub fn start(&self) -> Result<(), SchedulerError> {
        self.lock(|s| s.start())
    }

    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.lock(|s| s.stop())
    }

    pub fn poll(&self) -> Result<Option<PlaybackEvent>, SchedulerError> {
        self.lock(|s| s.poll())
    }

    pub fn poll_delay_us(&self) -> Option<u64> {
        self.lock(|s| s.poll_delay_us())
    }

    pub fn progress(&self) -> Progress {
        self.lock(|s| s.progress())
    }

    pub fn chain_progress(&self) -> f32 {
        self.lock(|s| s.chain_progress())
    }

    pub fn segment_progress(&self) -> f32 {
        self.lock(|s| s.segment_progress())
    }

    pub fn is_running(&self) -> bool {
        self.lock(|s| s.is_running())
    }

    pub fn staged_timing(&self) -> Option<Timing> {
        self.lock(|s| s.staged_timing().copied())
    }

    pub fn committed_timing(&self) -> Option<Timing> {
        self.lock(|s| s.committed_timing().copied())
    }

    pub fn staged_page(&self, offset: u32) -> Option<SequencePage> {
        self.lock(|s| s.staged_page(offset))
    }

    pub fn committed_page(&self, offset: u32) -> Option<SequencePage> {
        self.lock(|s| s.committed_page(offset))
    }
}
