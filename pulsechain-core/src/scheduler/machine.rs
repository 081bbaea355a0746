//! Scheduler state machine
//!
//! Owns the staged and committed schedule and drives the pulse engine
//! through a chain of segments with double-buffered handoff.
//!
//! # States
//!
//! ```text
//!            start()                 last segment done
//!   Idle ───────────────▶ Running ─────────────────────▶ Idle
//!     ▲                     │  ▲
//!     │       stop()        │  │ poll(): stage next at 50%,
//!     └─────────────────────┘  │ hand off at 100%
//!                              └──┘
//! ```
//!
//! While running, exactly one segment is playing and at most one more is
//! loaded into the spare slot. The spare is loaded once the current
//! segment is half played and started as soon as the current one ends.

use pulsechain_hal::{EngineError, PulseEngine, WaveformId};
use pulsechain_protocol::{SequencePage, SequencePolicy};
use rand::Rng;

use super::events::{PlaybackEvent, Progress};
use crate::chain::{Chain, Polarity, Segment};
use crate::error::SchedulerError;
use crate::sequence::Sequence;
use crate::timing::Timing;
use crate::traits::Clock;

/// Largest sequence accepted by default (32 KiB of packed ticks)
pub const DEFAULT_MAX_TICKS: u32 = 256 * 1024;

/// Playback settings fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackSettings {
    /// Tick to pin level mapping
    pub polarity: Polarity,
    /// Longest sequence that may be staged
    pub max_ticks: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            polarity: Polarity::ActiveHigh,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

/// The schedule currently driving the engine
#[derive(Debug)]
struct Committed {
    timing: Timing,
    sequence: Sequence,
    chain: Chain,
    tick_us: u32,
    chain_index: usize,
    started_at_us: u64,
    segment_started_us: u64,
    /// Slot of the playing segment
    current: WaveformId,
    /// Slot of the pre-staged following segment
    next: Option<WaveformId>,
}

impl Committed {
    fn segment(&self) -> Segment {
        self.chain.segments()[self.chain_index]
    }

    fn is_last(&self) -> bool {
        self.chain_index + 1 >= self.chain.len()
    }

    fn segment_duration_us(&self) -> u64 {
        self.segment().duration_us(self.tick_us)
    }

    fn segment_elapsed_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.segment_started_us)
    }

    fn elapsed_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.started_at_us)
    }

    fn chain_progress(&self, now_us: u64) -> f32 {
        fraction(self.elapsed_us(now_us), self.timing.adjusted_total_us())
    }

    fn segment_progress(&self, now_us: u64) -> f32 {
        fraction(self.segment_elapsed_us(now_us), self.segment_duration_us())
    }
}

fn fraction(elapsed: u64, total: u64) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (elapsed as f64 / total as f64).min(1.0) as f32
}

fn load_segment<E: PulseEngine>(
    engine: &mut E,
    committed: &Committed,
    index: usize,
    polarity: Polarity,
) -> Result<WaveformId, EngineError> {
    let segment = committed.chain.segments()[index];
    engine.load(segment.pulses(&committed.sequence, committed.tick_us, polarity))
}

/// Exposure schedule state machine
///
/// Not thread-safe on its own; wrap it in a
/// [`SharedScheduler`](super::SharedScheduler) to share it between tasks.
pub struct Scheduler<E, C> {
    engine: E,
    clock: C,
    settings: PlaybackSettings,
    staged_timing: Option<Timing>,
    staged_sequence: Option<Sequence>,
    committed: Option<Committed>,
}

impl<E: PulseEngine, C: Clock> Scheduler<E, C> {
    /// Create an idle scheduler with nothing staged
    pub fn new(engine: E, clock: C, settings: PlaybackSettings) -> Self {
        Self {
            engine,
            clock,
            settings,
            staged_timing: None,
            staged_sequence: None,
            committed: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Stage a new timing
    ///
    /// Any staged sequence is discarded, valid or not, since it may no
    /// longer match the timing's tick count.
    pub fn stage_timing(
        &mut self,
        total_s: f64,
        exposure_fraction: f64,
        resolution_s: f64,
    ) -> Result<(), SchedulerError> {
        let timing = Timing::compute(total_s, exposure_fraction, resolution_s)?;
        self.staged_timing = Some(timing);
        self.staged_sequence = None;
        Ok(())
    }

    /// Generate and stage a sequence for the staged timing
    pub fn stage_sequence<R: Rng + ?Sized>(
        &mut self,
        policy: SequencePolicy,
        rng: &mut R,
    ) -> Result<(), SchedulerError> {
        let timing = self.sequence_target()?;
        let sequence = Sequence::generate(policy, &timing, rng)?;
        self.install_sequence(&timing, sequence)
    }

    /// Staged timing a new sequence should be generated for
    pub fn sequence_target(&self) -> Result<Timing, SchedulerError> {
        let timing = self.staged_timing.ok_or(SchedulerError::NoTimingStaged)?;
        if timing.digital().total > self.settings.max_ticks {
            return Err(SchedulerError::InvalidSequence);
        }
        Ok(timing)
    }

    /// Stage a sequence generated for `timing`
    ///
    /// Fails with [`SchedulerError::InvalidSequence`] and leaves the staged
    /// state alone if `timing` is no longer the staged timing.
    pub fn install_sequence(
        &mut self,
        timing: &Timing,
        sequence: Sequence,
    ) -> Result<(), SchedulerError> {
        if self.staged_timing.as_ref() != Some(timing) {
            return Err(SchedulerError::InvalidSequence);
        }
        self.staged_sequence = Some(sequence);
        Ok(())
    }

    /// Commit the staged schedule and start the first segment
    ///
    /// The staged timing and sequence stay in place so the same schedule
    /// can be started again after it stops.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        let timing = self.staged_timing.ok_or(SchedulerError::NoTimingStaged)?;
        let sequence = self
            .staged_sequence
            .as_ref()
            .ok_or(SchedulerError::NoSequenceStaged)?;
        if self.committed.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if sequence.is_empty() {
            return Err(SchedulerError::InvalidSequence);
        }

        let sequence = sequence.clone();
        let tick_us = timing.resolution_us();
        let max_pulses = self.engine.limits().pulses_per_waveform(tick_us);
        let chain = Chain::split(sequence.len(), max_pulses);
        let first = chain.get(0).copied().ok_or(SchedulerError::InvalidSequence)?;

        let current = match self
            .engine
            .load(first.pulses(&sequence, tick_us, self.settings.polarity))
        {
            Ok(id) => id,
            Err(e) => return Err(self.abort(e)),
        };
        if let Err(e) = self.engine.play_once(current) {
            let _ = self.engine.free(current);
            return Err(self.abort(e));
        }

        let now = self.clock.now_us();
        self.committed = Some(Committed {
            timing,
            sequence,
            chain,
            tick_us,
            chain_index: 0,
            started_at_us: now,
            segment_started_us: now,
            current,
            next: None,
        });
        Ok(())
    }

    /// Halt playback, free every held slot and drive the pin off
    ///
    /// Safe to call at any time, including when idle. The committed
    /// schedule is cleared even if the engine reports an error.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        let mut result = self.engine.set_pin_level(self.settings.polarity.off_level());

        if let Some(committed) = self.committed.take() {
            for id in core::iter::once(committed.current).chain(committed.next) {
                if let Err(e) = self.engine.free(id) {
                    result = result.and(Err(e));
                }
            }
        }

        result.map_err(SchedulerError::EngineFailure)
    }

    /// Advance playback
    ///
    /// Call continuously from the playback loop. Pre-stages the next segment
    /// once the current one is half played and hands off when it ends. An
    /// engine failure stops playback before it is returned.
    pub fn poll(&mut self) -> Result<Option<PlaybackEvent>, SchedulerError> {
        self.engine.service();

        let now = self.clock.now_us();
        let polarity = self.settings.polarity;
        let Some(c) = self.committed.as_mut() else {
            return Ok(None);
        };
        let elapsed = c.segment_elapsed_us(now);
        let duration = c.segment_duration_us();

        if c.is_last() {
            if elapsed < duration || self.engine.is_playing() {
                return Ok(None);
            }
            self.stop()?;
            return Ok(Some(PlaybackEvent::Finished));
        }

        let next_index = c.chain_index + 1;

        if elapsed < duration {
            if c.next.is_some() || elapsed * 2 < duration {
                return Ok(None);
            }
            return match load_segment(&mut self.engine, c, next_index, polarity) {
                Ok(id) => {
                    c.next = Some(id);
                    Ok(Some(PlaybackEvent::SegmentStaged(next_index as u32)))
                }
                Err(e) => Err(self.abort(e)),
            };
        }

        // Handoff: the poll that staged the spare may have been skipped
        let next = match c.next {
            Some(id) => id,
            None => match load_segment(&mut self.engine, c, next_index, polarity) {
                Ok(id) => {
                    c.next = Some(id);
                    id
                }
                Err(e) => return Err(self.abort(e)),
            },
        };

        // Still draining means the engine queues `next` with no gap
        let gapless = self.engine.is_playing();
        if let Err(e) = self.engine.play_once(next) {
            return Err(self.abort(e));
        }

        let old = c.current;
        c.current = next;
        c.next = None;
        c.chain_index = next_index;
        c.segment_started_us = if gapless {
            c.segment_started_us + duration
        } else {
            now
        };

        if let Err(e) = self.engine.free(old) {
            return Err(self.abort(e));
        }
        Ok(Some(PlaybackEvent::SegmentStarted(next_index as u32)))
    }

    /// Microseconds until the next poll that has work to do
    ///
    /// `None` when idle.
    pub fn poll_delay_us(&self) -> Option<u64> {
        let c = self.committed.as_ref()?;
        let elapsed = c.segment_elapsed_us(self.clock.now_us());
        let duration = c.segment_duration_us();
        let boundary = if !c.is_last() && c.next.is_none() {
            duration.div_ceil(2)
        } else {
            duration
        };
        Some(boundary.saturating_sub(elapsed))
    }

    /// Fraction of the committed schedule played, 0.0 when idle
    pub fn chain_progress(&self) -> f32 {
        self.committed
            .as_ref()
            .map_or(0.0, |c| c.chain_progress(self.clock.now_us()))
    }

    /// Fraction of the current segment played, 0.0 when idle
    pub fn segment_progress(&self) -> f32 {
        self.committed
            .as_ref()
            .map_or(0.0, |c| c.segment_progress(self.clock.now_us()))
    }

    /// All progress figures from a single clock reading
    pub fn progress(&self) -> Progress {
        let Some(c) = self.committed.as_ref() else {
            return Progress::idle();
        };
        let now = self.clock.now_us();
        let elapsed_us = c.elapsed_us(now);
        Progress {
            chain: c.chain_progress(now),
            segment: c.segment_progress(now),
            chain_index: Some(c.chain_index as u32),
            chain_len: c.chain.len() as u32,
            elapsed_us,
            eta_us: Some(c.timing.adjusted_total_us().saturating_sub(elapsed_us)),
            started_at_us: Some(c.started_at_us),
        }
    }

    pub fn is_running(&self) -> bool {
        self.committed.is_some()
    }

    /// Current segment index, `None` when idle
    pub fn chain_index(&self) -> Option<usize> {
        self.committed.as_ref().map(|c| c.chain_index)
    }

    /// Segments of the committed chain, `None` when idle
    pub fn chain(&self) -> Option<&Chain> {
        self.committed.as_ref().map(|c| &c.chain)
    }

    pub fn staged_timing(&self) -> Option<&Timing> {
        self.staged_timing.as_ref()
    }

    pub fn staged_sequence(&self) -> Option<&Sequence> {
        self.staged_sequence.as_ref()
    }

    pub fn committed_timing(&self) -> Option<&Timing> {
        self.committed.as_ref().map(|c| &c.timing)
    }

    pub fn committed_sequence(&self) -> Option<&Sequence> {
        self.committed.as_ref().map(|c| &c.sequence)
    }

    /// Page of the staged sequence, `None` when nothing is staged
    pub fn staged_page(&self, offset: u32) -> Option<SequencePage> {
        self.staged_sequence.as_ref().map(|s| s.page(offset))
    }

    /// Page of the committed sequence, `None` when idle
    pub fn committed_page(&self, offset: u32) -> Option<SequencePage> {
        self.committed.as_ref().map(|c| c.sequence.page(offset))
    }

    fn abort(&mut self, cause: EngineError) -> SchedulerError {
        let _ = self.stop();
        SchedulerError::EngineFailure(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::vec::Vec;
    use core::cell::Cell;
    use pulsechain_hal::{EngineLimits, Level, Pulse};

    /// Minimal engine: plays instantly, tracks slot usage
    #[derive(Default)]
    struct CountingEngine {
        slots: [Option<u32>; 2],
        loads: u32,
        frees: u32,
        pin: Option<Level>,
        fail_load_after: Option<u32>,
    }

    impl PulseEngine for CountingEngine {
        fn limits(&self) -> EngineLimits {
            EngineLimits {
                max_pulses: 4,
                max_micros: None,
                max_waveforms: 2,
            }
        }

        fn load<I: IntoIterator<Item = Pulse>>(
            &mut self,
            pulses: I,
        ) -> Result<WaveformId, EngineError> {
            if self.fail_load_after == Some(self.loads) {
                return Err(EngineError::Hardware);
            }
            let pulses: Vec<Pulse> = pulses.into_iter().collect();
            let slot = self
                .slots
                .iter()
                .position(|s| s.is_none())
                .ok_or(EngineError::NoFreeSlot)?;
            self.slots[slot] = Some(pulses.len() as u32);
            self.loads += 1;
            Ok(WaveformId(slot as u8))
        }

        fn play_once(&mut self, id: WaveformId) -> Result<(), EngineError> {
            self.slots[id.0 as usize]
                .map(|_| ())
                .ok_or(EngineError::UnknownWaveform)
        }

        fn is_playing(&self) -> bool {
            false
        }

        fn free(&mut self, id: WaveformId) -> Result<(), EngineError> {
            self.slots[id.0 as usize]
                .take()
                .map(|_| self.frees += 1)
                .ok_or(EngineError::UnknownWaveform)
        }

        fn set_pin_level(&mut self, level: Level) -> Result<(), EngineError> {
            self.pin = Some(level);
            Ok(())
        }
    }

    struct TestClock(Cell<u64>);

    impl Clock for TestClock {
        fn now_us(&self) -> u64 {
            self.0.get()
        }
    }

    fn staged(total_s: f64, fraction: f64) -> Scheduler<CountingEngine, TestClock> {
        let mut scheduler = Scheduler::new(
            CountingEngine::default(),
            TestClock(Cell::new(0)),
            PlaybackSettings::default(),
        );
        scheduler.stage_timing(total_s, fraction, 1.0).unwrap();
        scheduler
            .stage_sequence(SequencePolicy::Regular, &mut rand::rngs::mock::StepRng::new(0, 1))
            .unwrap();
        scheduler
    }

    #[test]
    fn test_stage_timing_clears_sequence() {
        let mut scheduler = staged(10.0, 0.5);
        assert!(scheduler.staged_sequence().is_some());

        scheduler.stage_timing(20.0, 0.5, 1.0).unwrap();
        assert!(scheduler.staged_sequence().is_none());
        assert_eq!(scheduler.staged_timing().unwrap().digital().total, 20);
    }

    #[test]
    fn test_invalid_timing_keeps_previous() {
        let mut scheduler = staged(10.0, 0.5);
        assert_eq!(
            scheduler.stage_timing(10.0, 2.0, 1.0),
            Err(SchedulerError::InvalidTiming)
        );
        assert_eq!(scheduler.staged_timing().unwrap().digital().total, 10);
        assert!(scheduler.staged_sequence().is_some());
    }

    #[test]
    fn test_stage_sequence_requires_timing() {
        let mut scheduler = Scheduler::new(
            CountingEngine::default(),
            TestClock(Cell::new(0)),
            PlaybackSettings::default(),
        );
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        assert_eq!(
            scheduler.stage_sequence(SequencePolicy::Random, &mut rng),
            Err(SchedulerError::NoTimingStaged)
        );
    }

    #[test]
    fn test_sequence_over_max_ticks_rejected() {
        let mut scheduler = Scheduler::new(
            CountingEngine::default(),
            TestClock(Cell::new(0)),
            PlaybackSettings {
                polarity: Polarity::ActiveHigh,
                max_ticks: 100,
            },
        );
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        scheduler.stage_timing(101.0, 0.5, 1.0).unwrap();
        assert_eq!(
            scheduler.stage_sequence(SequencePolicy::Regular, &mut rng),
            Err(SchedulerError::InvalidSequence)
        );
    }

    #[test]
    fn test_sequence_for_replaced_timing_not_installed() {
        let mut scheduler = staged(10.0, 0.5);
        let target = scheduler.sequence_target().unwrap();
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let sequence = Sequence::generate(SequencePolicy::Regular, &target, &mut rng).unwrap();

        scheduler.stage_timing(20.0, 0.5, 1.0).unwrap();
        assert_eq!(
            scheduler.install_sequence(&target, sequence.clone()),
            Err(SchedulerError::InvalidSequence)
        );
        assert!(scheduler.staged_sequence().is_none());

        // Same parameters again: the sequence fits once more
        scheduler.stage_timing(10.0, 0.5, 1.0).unwrap();
        scheduler.install_sequence(&target, sequence).unwrap();
        assert_eq!(scheduler.staged_sequence().unwrap().len(), 10);
    }

    #[test]
    fn test_start_commits_copy_of_staged() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.start().unwrap();

        assert_eq!(scheduler.chain_index(), Some(0));
        // 10 ticks at 4 per waveform
        assert_eq!(scheduler.chain().map(|c| c.len()), Some(3));
        assert_eq!(scheduler.committed_sequence(), scheduler.staged_sequence());
        assert_eq!(scheduler.engine().loads, 1);
    }

    #[test]
    fn test_stages_at_half_and_hands_off_at_end() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.start().unwrap();
        assert_eq!(scheduler.poll_delay_us(), Some(2_000_000));

        scheduler.clock.0.set(1_999_999);
        assert_eq!(scheduler.poll(), Ok(None));

        scheduler.clock.0.set(2_000_000);
        assert_eq!(scheduler.poll(), Ok(Some(PlaybackEvent::SegmentStaged(1))));
        assert_eq!(scheduler.poll(), Ok(None));
        assert_eq!(scheduler.poll_delay_us(), Some(2_000_000));

        scheduler.clock.0.set(4_000_000);
        assert_eq!(scheduler.poll(), Ok(Some(PlaybackEvent::SegmentStarted(1))));
        assert_eq!(scheduler.chain_index(), Some(1));
        assert_eq!(scheduler.engine().frees, 1);
        assert_eq!(scheduler.segment_progress(), 0.0);
    }

    #[test]
    fn test_late_poll_loads_at_handoff() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.start().unwrap();

        scheduler.clock.0.set(4_500_000);
        assert_eq!(scheduler.poll(), Ok(Some(PlaybackEvent::SegmentStarted(1))));
        assert_eq!(scheduler.engine().loads, 2);
        assert_eq!(scheduler.engine().slots.iter().flatten().count(), 1);
    }

    #[test]
    fn test_stop_frees_both_slots_and_drives_pin_off() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.start().unwrap();
        scheduler.clock.0.set(2_000_000);
        scheduler.poll().unwrap();
        assert_eq!(scheduler.engine().slots.iter().flatten().count(), 2);

        scheduler.stop().unwrap();
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.engine().slots.iter().flatten().count(), 0);
        assert_eq!(scheduler.engine().pin, Some(Level::Low));
        assert_eq!(scheduler.progress(), Progress::idle());
    }

    #[test]
    fn test_load_failure_stops_playback() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.engine_mut().fail_load_after = Some(1);
        scheduler.start().unwrap();

        scheduler.clock.0.set(2_000_000);
        assert_eq!(
            scheduler.poll(),
            Err(SchedulerError::EngineFailure(EngineError::Hardware))
        );
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.engine().slots.iter().flatten().count(), 0);
    }

    #[test]
    fn test_start_failure_leaves_idle() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.engine_mut().fail_load_after = Some(0);
        assert_eq!(
            scheduler.start(),
            Err(SchedulerError::EngineFailure(EngineError::Hardware))
        );
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.engine().pin, Some(Level::Low));
    }

    #[test]
    fn test_progress_snapshot() {
        let mut scheduler = staged(10.0, 0.5);
        scheduler.clock.0.set(1_000);
        scheduler.start().unwrap();
        scheduler.clock.0.set(1_000 + 2_500_000);

        let progress = scheduler.progress();
        assert_eq!(progress.chain, 0.25);
        assert_eq!(progress.chain_index, Some(0));
        assert_eq!(progress.chain_len, 3);
        assert_eq!(progress.eta_us, Some(7_500_000));
        assert_eq!(progress.started_at_us, Some(1_000));
        assert_eq!(progress.segment, 0.625);
    }
}
