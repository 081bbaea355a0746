//! Request and response messages
//!
//! Every request travels in a [`MSG_REQUEST`] frame and is answered by
//! exactly one [`MSG_RESPONSE`] frame. Bodies are postcard-encoded.

use crate::frame::{Frame, FrameError};
use heapless::Vec;
use serde::{Deserialize, Serialize};

// Message type IDs
pub const MSG_REQUEST: u8 = 0x01;
pub const MSG_RESPONSE: u8 = 0x81;

/// Bytes of packed tick data carried by one sequence page
pub const MAX_PAGE_BYTES: usize = 192;

/// Ticks carried by one sequence page
pub const MAX_PAGE_TICKS: usize = MAX_PAGE_BYTES * 8;

/// Ordering policy for a generated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencePolicy {
    /// Evenly spaced ON ticks at a fixed period
    Regular,
    /// ON ticks at uniformly random positions
    Random,
}

/// Requests from the remote operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Stage a new timing (clears any staged sequence)
    StageTiming {
        total_s: f64,
        exposure_fraction: f64,
        resolution_s: f64,
    },
    /// Generate a sequence for the staged timing
    StageSequence(SequencePolicy),
    /// Commit the staged schedule and begin playback
    Start,
    /// Halt playback and drive the pin off
    Stop,
    QueryProgress,
    QueryStagedTiming,
    /// Read a page of the staged sequence starting at tick `offset`
    QueryStagedSequence { offset: u32 },
    QueryCommittedTiming,
    /// Read a page of the committed sequence starting at tick `offset`
    QueryCommittedSequence { offset: u32 },
}

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureReason {
    InvalidTiming,
    InvalidSequence,
    NoTimingStaged,
    NoSequenceStaged,
    AlreadyRunning,
    /// The pulse engine rejected a call; playback was stopped
    EngineFailure,
    /// The request frame could not be decoded
    Malformed,
}

/// A `{total, exposure}` pair in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecondsDomain {
    pub total_s: f64,
    pub exposure_s: f64,
}

/// A `{total, exposure}` pair in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickDomain {
    pub total: u32,
    pub exposure: u32,
}

/// All three domains of a timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingReport {
    pub resolution_s: f64,
    pub specified: SecondsDomain,
    pub digital: TickDomain,
    pub adjusted: SecondsDomain,
}

/// Playback progress at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgressReport {
    pub running: bool,
    /// Fraction of the whole schedule played, 0.0 to 1.0
    pub chain: f32,
    /// Fraction of the current segment played, 0.0 to 1.0
    pub segment: f32,
    pub chain_index: u32,
    pub chain_len: u32,
    pub elapsed_us: u64,
    pub eta_us: Option<u64>,
    pub started_at_us: Option<u64>,
}

/// A window of a sequence, one bit per tick
///
/// Bits are packed LSB first: tick `offset + i` lives in bit `i % 8` of
/// byte `i / 8`. A set bit is an ON tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequencePage {
    /// Length of the whole sequence
    pub total_ticks: u32,
    /// ON ticks in the whole sequence
    pub on_ticks: u32,
    /// Index of the first tick in this page
    pub offset: u32,
    /// Ticks in this page
    pub count: u16,
    pub bits: Vec<u8, MAX_PAGE_BYTES>,
}

impl SequencePage {
    /// Pack up to [`MAX_PAGE_TICKS`] ticks into a page
    ///
    /// Ticks beyond the page capacity are left for the next page.
    pub fn pack<I>(total_ticks: u32, on_ticks: u32, offset: u32, ticks: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bits: Vec<u8, MAX_PAGE_BYTES> = Vec::new();
        let mut count: usize = 0;

        for on in ticks.into_iter().take(MAX_PAGE_TICKS) {
            if count % 8 == 0 {
                // take() bounds count, so the push always fits
                let _ = bits.push(0);
            }
            if on {
                if let Some(byte) = bits.last_mut() {
                    *byte |= 1 << (count % 8);
                }
            }
            count += 1;
        }

        Self {
            total_ticks,
            on_ticks,
            offset,
            count: count as u16,
            bits,
        }
    }

    /// Get a tick by its index within the page
    pub fn tick(&self, index: usize) -> Option<bool> {
        if index >= self.count as usize {
            return None;
        }
        self.bits.get(index / 8).map(|b| b & (1 << (index % 8)) != 0)
    }

    /// Iterate the ticks in this page
    pub fn ticks(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.count as usize).filter_map(move |i| self.tick(i))
    }

    /// Offset of the page following this one, if any
    pub fn next_offset(&self) -> Option<u32> {
        let next = self.offset + self.count as u32;
        (next < self.total_ticks && self.count > 0).then_some(next)
    }
}

/// Data returned by a successful query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Payload {
    Progress(ProgressReport),
    Timing(TimingReport),
    Sequence(SequencePage),
}

/// Response to a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Request succeeded; queries on an empty slot carry no payload
    Success(Option<Payload>),
    Failure(FailureReason),
}

impl Response {
    /// Successful response without data
    pub const fn ok() -> Self {
        Response::Success(None)
    }

    /// Check if this response reports success
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::with_message(MSG_RESPONSE, self)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        frame.message(MSG_RESPONSE)
    }
}

impl Request {
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::with_message(MSG_REQUEST, self)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        frame.message(MSG_REQUEST)
    }
}
