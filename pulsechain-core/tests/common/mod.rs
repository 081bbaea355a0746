//! Simulated pulse engine and manual clock shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pulsechain_core::traits::Clock;
use pulsechain_hal::{EngineError, EngineLimits, Level, Pulse, PulseEngine, WaveformId};

/// Clock advanced by hand, shared between the test and the engine
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now_us: u64) {
        self.0.store(now_us, Ordering::SeqCst);
    }

    pub fn advance(&self, us: u64) {
        self.0.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// One call to `play_once`, as the engine scheduled it
#[derive(Debug, Clone)]
pub struct PlayRecord {
    pub id: WaveformId,
    pub start_us: u64,
    pub end_us: u64,
    pub pulses: Vec<Pulse>,
}

/// Loaded waveform; `freed` slots stay held until their last play ends
#[derive(Debug, Clone)]
struct Slot {
    pulses: Vec<Pulse>,
    freed: bool,
}

/// Pulse engine that plays waveforms on a virtual timeline
///
/// `play_once` on a busy engine queues behind the running waveform, like
/// hardware with a FIFO. Slot limits are enforced the way a real engine
/// would enforce them, including deferred release of freed waveforms.
pub struct SimEngine {
    clock: ManualClock,
    limits: EngineLimits,
    slots: Vec<Option<Slot>>,
    busy_until: u64,
    pub plays: Vec<PlayRecord>,
    pub pin: Option<Level>,
    pub max_slots_held: usize,
    pub halted_while_playing: u32,
    /// Fail the play with this index (0-based)
    pub fail_play: Option<usize>,
    /// Fail the load with this index (0-based)
    pub fail_load: Option<usize>,
    loads: usize,
}

impl SimEngine {
    pub fn new(clock: ManualClock, limits: EngineLimits) -> Self {
        Self {
            clock,
            limits,
            slots: vec![None; limits.max_waveforms as usize],
            busy_until: 0,
            plays: Vec::new(),
            pin: None,
            max_slots_held: 0,
            halted_while_playing: 0,
            fail_play: None,
            fail_load: None,
            loads: 0,
        }
    }

    pub fn with_max_pulses(clock: ManualClock, max_pulses: u32) -> Self {
        Self::new(
            clock,
            EngineLimits {
                max_pulses,
                max_micros: None,
                max_waveforms: 2,
            },
        )
    }

    pub fn slots_held(&self) -> usize {
        (0..self.slots.len()).filter(|&i| self.is_held(i)).count()
    }

    fn is_held(&self, index: usize) -> bool {
        match &self.slots[index] {
            Some(slot) if slot.freed => {
                self.draining_until(WaveformId(index as u8)) > self.clock.now_us()
            }
            Some(_) => true,
            None => false,
        }
    }

    /// End of the last play of `id`
    fn draining_until(&self, id: WaveformId) -> u64 {
        self.plays
            .iter()
            .rev()
            .find(|p| p.id == id)
            .map_or(0, |p| p.end_us)
    }

    /// Every level the pin was driven to, one entry per pulse, in play order
    pub fn played_levels(&self) -> Vec<Level> {
        self.plays
            .iter()
            .flat_map(|p| p.pulses.iter().map(|pulse| pulse.level))
            .collect()
    }

    /// Check that each waveform started exactly when the previous one ended
    pub fn is_gapless(&self) -> bool {
        self.plays
            .windows(2)
            .all(|pair| pair[1].start_us == pair[0].end_us)
    }

    fn slot(&self, id: WaveformId) -> Result<&Vec<Pulse>, EngineError> {
        self.slots
            .get(id.0 as usize)
            .and_then(|s| s.as_ref())
            .filter(|s| !s.freed)
            .map(|s| &s.pulses)
            .ok_or(EngineError::UnknownWaveform)
    }
}

impl PulseEngine for SimEngine {
    fn limits(&self) -> EngineLimits {
        self.limits
    }

    fn load<I>(&mut self, pulses: I) -> Result<WaveformId, EngineError>
    where
        I: IntoIterator<Item = Pulse>,
    {
        let index = self.loads;
        self.loads += 1;
        if self.fail_load == Some(index) {
            return Err(EngineError::Hardware);
        }

        let pulses: Vec<Pulse> = pulses.into_iter().collect();
        if pulses.len() as u32 > self.limits.max_pulses {
            return Err(EngineError::TooManyPulses);
        }
        if let Some(max_us) = self.limits.max_micros {
            let total: u64 = pulses.iter().map(|p| p.duration_us as u64).sum();
            if total > max_us {
                return Err(EngineError::PulseTooLong);
            }
        }

        let slot = (0..self.slots.len())
            .find(|&i| !self.is_held(i))
            .ok_or(EngineError::NoFreeSlot)?;
        self.slots[slot] = Some(Slot {
            pulses,
            freed: false,
        });
        self.max_slots_held = self.max_slots_held.max(self.slots_held());
        Ok(WaveformId(slot as u8))
    }

    fn play_once(&mut self, id: WaveformId) -> Result<(), EngineError> {
        if self.fail_play == Some(self.plays.len()) {
            return Err(EngineError::Hardware);
        }
        let pulses = self.slot(id)?.clone();
        let duration: u64 = pulses.iter().map(|p| p.duration_us as u64).sum();
        let start_us = self.clock.now_us().max(self.busy_until);
        let end_us = start_us + duration;
        self.busy_until = end_us;
        self.plays.push(PlayRecord {
            id,
            start_us,
            end_us,
            pulses,
        });
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.clock.now_us() < self.busy_until
    }

    fn free(&mut self, id: WaveformId) -> Result<(), EngineError> {
        self.slot(id)?;
        if let Some(slot) = self.slots[id.0 as usize].as_mut() {
            slot.freed = true;
        }
        Ok(())
    }

    fn set_pin_level(&mut self, level: Level) -> Result<(), EngineError> {
        let now = self.clock.now_us();
        for play in self.plays.iter_mut().filter(|p| p.end_us > now) {
            if play.start_us <= now {
                self.halted_while_playing += 1;
            }
            play.start_us = play.start_us.min(now);
            play.end_us = now;
        }
        self.busy_until = self.busy_until.min(now);
        self.pin = Some(level);
        Ok(())
    }
}
