//! PIO-based pulse engine
//!
//! Plays compiled waveforms on one output pin through a PIO state machine.
//! Waveforms live in RAM as FIFO words; [`PioPulseEngine::service`] copies
//! them into the TX FIFO as space frees up, so it must be called often
//! while a waveform plays. The scheduler's poll loop does this.
//!
//! A waveform started while another is still being played is queued
//! behind it and follows with no gap, as long as the FIFO never runs dry.

use alloc::vec::Vec;

use embassy_rp::gpio::Level as GpioLevel;
use embassy_rp::pio::{
    Common, Config, Direction as PioDirection, FifoJoin, Instance, Pin, PioPin, ShiftConfig,
    ShiftDirection, StateMachine,
};
use embassy_rp::Peri;
use embassy_time::{Duration, Instant};
use fixed::types::U24F8;
use heapless::Deque;
use pulsechain_hal::{EngineError, EngineLimits, Level, Pulse, PulseEngine, WaveformId};

use crate::pio::{compile, CLOCK_DIVIDER};

/// Waveform slots per engine
pub const SLOTS: usize = 2;

struct Waveform {
    words: Vec<u32>,
    duration_us: u64,
    /// Freed while queued; dropped once its last word is in the FIFO
    release: bool,
}

fn gpio_level(level: Level) -> GpioLevel {
    if level.is_high() {
        GpioLevel::High
    } else {
        GpioLevel::Low
    }
}

/// Pulse engine on a single PIO state machine
pub struct PioPulseEngine<'d, PIO: Instance, const SM: usize> {
    /// PIO state machine running the pulse program
    sm: StateMachine<'d, PIO, SM>,
    /// Output pin, owned by the state machine
    pin: Pin<'d, PIO>,
    /// Kept to reset the state machine to the program start
    config: Config<'d, PIO>,
    max_pulses: u32,
    /// Reported to the scheduler to shorten segments; not enforced
    max_micros: Option<u64>,
    slots: [Option<Waveform>; SLOTS],
    /// Waveforms waiting for FIFO space, front one partly written
    queue: Deque<WaveformId, SLOTS>,
    /// Next word of the front waveform
    cursor: usize,
    /// When the last queued word finishes playing
    busy_until: Instant,
    /// FIFO ran dry while words were still waiting
    underruns: u32,
}

impl<'d, PIO: Instance, const SM: usize> PioPulseEngine<'d, PIO, SM> {
    /// Create a new PIO pulse engine
    ///
    /// # Arguments
    /// * `common` - PIO common resources (for loading program)
    /// * `sm` - State machine to use
    /// * `pin` - Output GPIO pin (must be PIO-capable)
    /// * `idle` - Level to drive until the first waveform plays
    /// * `max_pulses` - Pulse ceiling per waveform
    pub fn new<P: PioPin>(
        common: &mut Common<'d, PIO>,
        mut sm: StateMachine<'d, PIO, SM>,
        pin: Peri<'d, P>,
        idle: Level,
        max_pulses: u32,
    ) -> Self {
        // One FIFO word per run: level bit, then a 31-bit delay count
        let prg = pio::pio_asm!(
            ".wrap_target",
            "pull block",
            "out pins, 1",
            "out x, 31",
            "delay:",
            "jmp x-- delay",
            ".wrap"
        );

        let installed = common.load_program(&prg.program);
        let pin = common.make_pio_pin(pin);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[]);
        cfg.set_out_pins(&[&pin]);
        cfg.set_set_pins(&[&pin]);
        cfg.clock_divider = U24F8::from_bits((CLOCK_DIVIDER as u32) << 8);
        cfg.shift_out = ShiftConfig {
            threshold: 32,
            direction: ShiftDirection::Right,
            auto_fill: false,
        };
        cfg.fifo_join = FifoJoin::TxOnly;

        sm.set_config(&cfg);
        sm.set_pin_dirs(PioDirection::Out, &[&pin]);
        sm.set_pins(gpio_level(idle), &[&pin]);
        sm.set_enable(true);

        Self {
            sm,
            pin,
            config: cfg,
            max_pulses,
            max_micros: None,
            slots: [None, None],
            queue: Deque::new(),
            cursor: 0,
            busy_until: Instant::now(),
            underruns: 0,
        }
    }

    /// Cap the duration of each segment the scheduler builds
    ///
    /// The state machine can time any length; this only keeps segments
    /// short enough that progress and handoff stay responsive.
    pub fn with_max_micros(mut self, max_micros: Option<u64>) -> Self {
        self.max_micros = max_micros;
        self
    }

    /// FIFO underruns seen since the engine was created
    pub fn underruns(&self) -> u32 {
        self.underruns
    }

    fn loaded(&self, id: WaveformId) -> Result<&Waveform, EngineError> {
        self.slots
            .get(id.0 as usize)
            .and_then(|s| s.as_ref())
            .filter(|w| !w.release)
            .ok_or(EngineError::UnknownWaveform)
    }

    /// Stop the state machine and drop everything queued
    fn halt(&mut self) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
        self.sm.restart();
        // Jumps back to the program origin
        self.sm.set_config(&self.config);

        self.queue.clear();
        self.cursor = 0;
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|w| w.release) {
                *slot = None;
            }
        }
        self.busy_until = Instant::now();
    }

    fn top_up(&mut self) {
        if !self.queue.is_empty() && self.sm.tx().stalled() {
            self.underruns += 1;
        }

        while let Some(&id) = self.queue.front() {
            let index = id.0 as usize;
            let release = match self.slots[index].as_ref() {
                Some(waveform) => {
                    while let Some(&word) = waveform.words.get(self.cursor) {
                        if !self.sm.tx().try_push(word) {
                            return;
                        }
                        self.cursor += 1;
                    }
                    waveform.release
                }
                None => false,
            };

            // Whole waveform is in the FIFO
            self.queue.pop_front();
            self.cursor = 0;
            if release {
                self.slots[index] = None;
            }
        }
    }
}

impl<'d, PIO: Instance, const SM: usize> PulseEngine for PioPulseEngine<'d, PIO, SM> {
    fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_pulses: self.max_pulses,
            max_micros: self.max_micros,
            max_waveforms: SLOTS as u8,
        }
    }

    fn load<I>(&mut self, pulses: I) -> Result<WaveformId, EngineError>
    where
        I: IntoIterator<Item = Pulse>,
    {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(EngineError::NoFreeSlot)?;

        let mut words = Vec::new();
        let limit = self.max_pulses as usize + 1;
        let (count, duration_us) = compile(pulses.into_iter().take(limit), |word| {
            words.push(word);
            Ok(())
        })?;
        if count > self.max_pulses {
            return Err(EngineError::TooManyPulses);
        }

        words.shrink_to_fit();
        self.slots[index] = Some(Waveform {
            words,
            duration_us,
            release: false,
        });
        Ok(WaveformId(index as u8))
    }

    fn play_once(&mut self, id: WaveformId) -> Result<(), EngineError> {
        let duration_us = self.loaded(id)?.duration_us;
        if self.queue.is_empty() {
            // Idle stalls on `pull` set the flag; clear it before counting
            let _ = self.sm.tx().stalled();
        }
        self.queue.push_back(id).map_err(|_| EngineError::Busy)?;

        let start = self.busy_until.max(Instant::now());
        self.busy_until = start + Duration::from_micros(duration_us);
        self.top_up();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        !self.queue.is_empty() || Instant::now() < self.busy_until
    }

    fn free(&mut self, id: WaveformId) -> Result<(), EngineError> {
        let queued = self.queue.iter().any(|&q| q == id);
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(EngineError::UnknownWaveform)?;

        match slot.as_mut() {
            Some(waveform) if !waveform.release => {
                if queued {
                    waveform.release = true;
                    return Ok(());
                }
            }
            _ => return Err(EngineError::UnknownWaveform),
        }
        *slot = None;
        Ok(())
    }

    fn set_pin_level(&mut self, level: Level) -> Result<(), EngineError> {
        self.halt();
        self.sm.set_pins(gpio_level(level), &[&self.pin]);
        self.sm.set_enable(true);
        Ok(())
    }

    fn service(&mut self) {
        self.top_up();
    }
}
