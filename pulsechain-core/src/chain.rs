//! Chain splitting
//!
//! A sequence is usually far longer than one engine waveform can hold. The
//! splitter cuts it into contiguous segments that each fit the engine's
//! per-waveform pulse ceiling. Segments are index ranges into the sequence;
//! pulses are expanded only when a segment is loaded.

use alloc::vec::Vec;

use pulsechain_hal::{Level, Pulse};

use crate::sequence::Sequence;

/// Mapping from tick value to pin level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// ON drives the pin high
    #[default]
    ActiveHigh,
    /// ON drives the pin low
    ActiveLow,
}

impl Polarity {
    pub fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Polarity::ActiveLow
        } else {
            Polarity::ActiveHigh
        }
    }

    /// Pin level for an ON tick
    pub fn on_level(self) -> Level {
        match self {
            Polarity::ActiveHigh => Level::High,
            Polarity::ActiveLow => Level::Low,
        }
    }

    /// Pin level for an OFF tick, also the safe idle level
    pub fn off_level(self) -> Level {
        self.on_level().inverted()
    }

    /// Pin level for a tick
    pub fn level(self, on: bool) -> Level {
        if on {
            self.on_level()
        } else {
            self.off_level()
        }
    }
}

/// A contiguous run of ticks loaded as one waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Index of the first tick
    pub start: u32,
    /// Number of ticks
    pub len: u32,
}

impl Segment {
    /// Playback duration in microseconds
    pub fn duration_us(&self, tick_us: u32) -> u64 {
        self.len as u64 * tick_us as u64
    }

    /// Expand this segment into timed pulses
    pub fn pulses<'a>(
        &self,
        sequence: &'a Sequence,
        tick_us: u32,
        polarity: Polarity,
    ) -> impl Iterator<Item = Pulse> + 'a {
        sequence
            .range(self.start, self.len)
            .map(move |on| Pulse::new(polarity.level(on), tick_us))
    }
}

/// Ordered segments covering a whole sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    segments: Vec<Segment>,
}

impl Chain {
    /// Split a sequence of `len` ticks into segments of at most `max_pulses`
    ///
    /// The segment length is the smallest that needs no more waveforms than
    /// `ceil(len / max_pulses)`. The sequence is cut into equal segments of
    /// that length, plus one shorter segment for any remainder. A sequence
    /// that fits in one waveform becomes a single segment.
    pub fn split(len: u32, max_pulses: u32) -> Self {
        let max_pulses = max_pulses.max(1);
        let chain_len = len.div_ceil(max_pulses);

        if chain_len <= 1 {
            let mut segments = Vec::with_capacity(1);
            segments.push(Segment { start: 0, len });
            return Self { segments };
        }

        let segment_len = len.div_ceil(chain_len);
        let full = len / segment_len;
        let remainder = len % segment_len;
        let mut segments = Vec::with_capacity(full as usize + 1);
        for i in 0..full {
            segments.push(Segment {
                start: i * segment_len,
                len: segment_len,
            });
        }
        if remainder != 0 {
            segments.push(Segment {
                start: full * segment_len,
                len: remainder,
            });
        }

        Self { segments }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
