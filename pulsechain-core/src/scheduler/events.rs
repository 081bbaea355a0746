//! Playback events and progress snapshots

use pulsechain_protocol::ProgressReport;

/// Something the playback loop did on a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackEvent {
    /// Segment loaded into the spare slot, waiting for handoff
    SegmentStaged(u32),
    /// Segment took over from its predecessor
    SegmentStarted(u32),
    /// Last segment completed; scheduler is idle again
    Finished,
}

/// Consistent view of playback progress at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Progress {
    /// Fraction of the schedule played, 0.0 to 1.0
    pub chain: f32,
    /// Fraction of the current segment played, 0.0 to 1.0
    pub segment: f32,
    /// Current segment, `None` when idle
    pub chain_index: Option<u32>,
    /// Number of segments in the committed chain
    pub chain_len: u32,
    /// Time since playback started
    pub elapsed_us: u64,
    /// Estimated time to completion
    pub eta_us: Option<u64>,
    /// Clock reading when playback started
    pub started_at_us: Option<u64>,
}

impl Progress {
    /// Snapshot of an idle scheduler
    pub const fn idle() -> Self {
        Self {
            chain: 0.0,
            segment: 0.0,
            chain_index: None,
            chain_len: 0,
            elapsed_us: 0,
            eta_us: None,
            started_at_us: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.chain_index.is_some()
    }

    /// Convert to the wire representation
    pub fn report(&self) -> ProgressReport {
        ProgressReport {
            running: self.is_running(),
            chain: self.chain,
            segment: self.segment,
            chain_index: self.chain_index.unwrap_or(0),
            chain_len: self.chain_len,
            elapsed_us: self.elapsed_us,
            eta_us: self.eta_us,
            started_at_us: self.started_at_us,
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::idle()
    }
}
