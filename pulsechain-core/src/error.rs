//! Scheduler error taxonomy

use pulsechain_hal::EngineError;
use pulsechain_protocol::FailureReason;

/// Errors returned by scheduler operations
///
/// Validation errors and sequencing errors leave scheduler state unchanged.
/// An engine failure has already forced a stop by the time it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// Timing parameters out of range
    InvalidTiming,
    /// Sequence cannot be built or played
    InvalidSequence,
    /// Operation needs a staged timing
    NoTimingStaged,
    /// Operation needs a staged sequence
    NoSequenceStaged,
    /// A schedule is already committed
    AlreadyRunning,
    /// The pulse engine rejected a call
    EngineFailure(EngineError),
}

impl SchedulerError {
    /// Short description for status output
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerError::InvalidTiming => "invalid timing",
            SchedulerError::InvalidSequence => "invalid sequence",
            SchedulerError::NoTimingStaged => "no timing staged",
            SchedulerError::NoSequenceStaged => "no sequence staged",
            SchedulerError::AlreadyRunning => "already running",
            SchedulerError::EngineFailure(_) => "engine failure",
        }
    }
}

impl core::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SchedulerError::EngineFailure(e) => write!(f, "engine failure: {}", e),
            other => f.write_str(other.as_str()),
        }
    }
}

impl From<EngineError> for SchedulerError {
    fn from(e: EngineError) -> Self {
        SchedulerError::EngineFailure(e)
    }
}

impl From<SchedulerError> for FailureReason {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::InvalidTiming => FailureReason::InvalidTiming,
            SchedulerError::InvalidSequence => FailureReason::InvalidSequence,
            SchedulerError::NoTimingStaged => FailureReason::NoTimingStaged,
            SchedulerError::NoSequenceStaged => FailureReason::NoSequenceStaged,
            SchedulerError::AlreadyRunning => FailureReason::AlreadyRunning,
            SchedulerError::EngineFailure(_) => FailureReason::EngineFailure,
        }
    }
}
