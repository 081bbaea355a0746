//! Pulse engine abstraction
//!
//! A pulse engine compiles a list of timed pulses into a waveform held in
//! hardware (or driver) memory and replays it once on a single output pin.
//! Engines have a small, fixed number of waveform slots and a per-waveform
//! ceiling on pulse count and total duration.

/// Output pin level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Pin driven low
    Low,
    /// Pin driven high
    High,
}

impl Level {
    /// Get the opposite level
    pub fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    /// Check if this is the high level
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// A single timed pulse: hold `level` for `duration_us` microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pulse {
    /// Level to drive for the whole pulse
    pub level: Level,
    /// Pulse duration in microseconds
    pub duration_us: u32,
}

impl Pulse {
    /// Create a new pulse
    pub const fn new(level: Level, duration_us: u32) -> Self {
        Self { level, duration_us }
    }
}

/// Handle to a waveform loaded into an engine slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveformId(pub u8);

/// Errors reported by a pulse engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// All waveform slots are in use
    NoFreeSlot,
    /// Waveform exceeds the per-waveform pulse ceiling
    TooManyPulses,
    /// A single pulse is longer than the engine can time
    PulseTooLong,
    /// Handle does not refer to a loaded waveform
    UnknownWaveform,
    /// Engine cannot accept the request in its current state
    Busy,
    /// Underlying peripheral reported a fault
    Hardware,
}

impl EngineError {
    /// Short description for status output
    pub fn as_str(self) -> &'static str {
        match self {
            EngineError::NoFreeSlot => "no free waveform slot",
            EngineError::TooManyPulses => "too many pulses",
            EngineError::PulseTooLong => "pulse too long",
            EngineError::UnknownWaveform => "unknown waveform",
            EngineError::Busy => "engine busy",
            EngineError::Hardware => "hardware fault",
        }
    }
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity limits of a pulse engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineLimits {
    /// Maximum pulses in a single waveform
    pub max_pulses: u32,
    /// Maximum total duration of a single waveform (None = unbounded)
    pub max_micros: Option<u64>,
    /// Maximum number of simultaneously loaded waveforms
    pub max_waveforms: u8,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_pulses: 4000,
            max_micros: None,
            max_waveforms: 2,
        }
    }
}

impl EngineLimits {
    /// Number of equal-length pulses that fit in one waveform
    ///
    /// Takes both the pulse count ceiling and the duration ceiling into
    /// account. Always at least 1.
    pub fn pulses_per_waveform(&self, pulse_us: u32) -> u32 {
        let by_count = self.max_pulses.max(1);
        match self.max_micros {
            Some(max_us) if pulse_us > 0 => {
                let by_time = (max_us / pulse_us as u64).min(u32::MAX as u64) as u32;
                by_count.min(by_time).max(1)
            }
            _ => by_count,
        }
    }
}

/// Pulse engine driving a single output pin
///
/// Implementations own a small table of waveform slots. The scheduler
/// guarantees it never holds more than two at once (current + next).
pub trait PulseEngine {
    /// Get the engine's capacity limits
    fn limits(&self) -> EngineLimits;

    /// Compile pulses into a loaded (idle) waveform
    ///
    /// The waveform does not start playing until [`play_once`](Self::play_once).
    fn load<I>(&mut self, pulses: I) -> Result<WaveformId, EngineError>
    where
        I: IntoIterator<Item = Pulse>;

    /// Play a loaded waveform once
    ///
    /// Engines that can queue behind a running waveform start it as soon
    /// as the running one completes; others start it immediately.
    fn play_once(&mut self, id: WaveformId) -> Result<(), EngineError>;

    /// Check whether any waveform is currently playing
    fn is_playing(&self) -> bool;

    /// Free a loaded waveform slot
    ///
    /// The id is invalid once this returns, but freeing never cuts playback
    /// short: a waveform that is playing or queued still plays to its end,
    /// and its slot only becomes available to [`load`](Self::load) after it
    /// has drained. Use [`set_pin_level`](Self::set_pin_level) to halt.
    fn free(&mut self, id: WaveformId) -> Result<(), EngineError>;

    /// Halt all playback and drive the pin to a fixed level
    fn set_pin_level(&mut self, level: Level) -> Result<(), EngineError>;

    /// Give software-fed engines a chance to refill hardware buffers
    ///
    /// Called on every playback loop iteration.
    fn service(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_inverted() {
        assert_eq!(Level::High.inverted(), Level::Low);
        assert_eq!(Level::Low.inverted(), Level::High);
        assert!(Level::High.is_high());
    }

    #[test]
    fn test_pulses_per_waveform_count_bound() {
        let limits = EngineLimits {
            max_pulses: 4000,
            max_micros: None,
            max_waveforms: 2,
        };
        assert_eq!(limits.pulses_per_waveform(1_000_000), 4000);
    }

    #[test]
    fn test_pulses_per_waveform_time_bound() {
        // 10s per waveform at 1s per pulse = 10 pulses
        let limits = EngineLimits {
            max_pulses: 4000,
            max_micros: Some(10_000_000),
            max_waveforms: 2,
        };
        assert_eq!(limits.pulses_per_waveform(1_000_000), 10);

        // Short pulses fall back to the count bound
        assert_eq!(limits.pulses_per_waveform(100), 4000);
    }

    #[test]
    fn test_pulses_per_waveform_never_zero() {
        let limits = EngineLimits {
            max_pulses: 4000,
            max_micros: Some(10),
            max_waveforms: 2,
        };
        assert_eq!(limits.pulses_per_waveform(1_000_000), 1);
    }
}
