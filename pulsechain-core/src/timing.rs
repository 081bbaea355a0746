//! Timing model
//!
//! A [`Timing`] ties three views of the same schedule together:
//!
//! - `specified`: what the caller asked for, in seconds
//! - `digital`: the same budget discretized into ticks
//! - `adjusted`: the ticks converted back to seconds, i.e. what actually plays
//!
//! `adjusted` generally differs from `specified` by up to half a tick per
//! field because of rounding. Ticks are whole microseconds, so `adjusted`
//! is exactly the time the pulse engine plays.

use pulsechain_protocol::{SecondsDomain, TickDomain, TimingReport};

use crate::error::SchedulerError;

/// Smallest tick the pulse engine can represent, in seconds
pub const MIN_RESOLUTION_S: f64 = 1e-6;

/// Largest tick that still fits in a single pulse, in seconds
pub const MAX_RESOLUTION_S: f64 = u32::MAX as f64 / 1e6;

/// A `{total, exposure}` pair with `exposure <= total`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Domain<T> {
    pub total: T,
    pub exposure: T,
}

impl Domain<f64> {
    fn report(&self) -> SecondsDomain {
        SecondsDomain {
            total_s: self.total,
            exposure_s: self.exposure,
        }
    }
}

/// Discretized timing of one schedule
///
/// Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    resolution_s: f64,
    tick_us: u32,
    specified: Domain<f64>,
    digital: Domain<u32>,
    adjusted: Domain<f64>,
}

fn to_ticks(seconds: f64, resolution_s: f64) -> Result<u32, SchedulerError> {
    let ticks = libm::round(seconds / resolution_s);
    if !(0.0..=u32::MAX as f64).contains(&ticks) {
        return Err(SchedulerError::InvalidTiming);
    }
    Ok(ticks as u32)
}

/// Resolution as a whole number of microseconds
fn to_tick_us(resolution_s: f64) -> Result<u32, SchedulerError> {
    let us = resolution_s * 1e6;
    let tick_us = libm::round(us);
    // Tolerate float noise like 0.001 * 1e6 = 1000.0000000000001
    if libm::fabs(us - tick_us) > tick_us * 1e-9 {
        return Err(SchedulerError::InvalidTiming);
    }
    Ok(tick_us as u32)
}

impl Timing {
    /// Compute a timing from a total duration, an exposure fraction and a
    /// tick resolution
    ///
    /// Fails with [`SchedulerError::InvalidTiming`] when the resolution is
    /// not a whole number of microseconds between 1 µs and
    /// [`MAX_RESOLUTION_S`], the fraction is outside `[0, 1]`, the total is
    /// negative, or any input is not finite.
    pub fn compute(
        total_s: f64,
        exposure_fraction: f64,
        resolution_s: f64,
    ) -> Result<Self, SchedulerError> {
        if !total_s.is_finite() || total_s < 0.0 {
            return Err(SchedulerError::InvalidTiming);
        }
        if !(0.0..=1.0).contains(&exposure_fraction) {
            return Err(SchedulerError::InvalidTiming);
        }
        if !(MIN_RESOLUTION_S..=MAX_RESOLUTION_S).contains(&resolution_s) {
            return Err(SchedulerError::InvalidTiming);
        }
        let tick_us = to_tick_us(resolution_s)?;
        let resolution_s = tick_us as f64 / 1e6;

        let exposure_s = total_s * exposure_fraction;
        let total = to_ticks(total_s, resolution_s)?;
        let exposure = to_ticks(exposure_s, resolution_s)?;

        Ok(Self {
            resolution_s,
            tick_us,
            specified: Domain {
                total: total_s,
                exposure: exposure_s,
            },
            digital: Domain { total, exposure },
            adjusted: Domain {
                total: total as f64 * tick_us as f64 / 1e6,
                exposure: exposure as f64 * tick_us as f64 / 1e6,
            },
        })
    }

    /// Seconds per tick, a whole number of microseconds
    pub fn resolution_s(&self) -> f64 {
        self.resolution_s
    }

    /// Microseconds per tick, as handed to the pulse engine
    pub fn resolution_us(&self) -> u32 {
        self.tick_us
    }

    pub fn specified(&self) -> Domain<f64> {
        self.specified
    }

    pub fn digital(&self) -> Domain<u32> {
        self.digital
    }

    pub fn adjusted(&self) -> Domain<f64> {
        self.adjusted
    }

    /// Playback duration of the full digital total, in microseconds
    pub fn adjusted_total_us(&self) -> u64 {
        self.digital.total as u64 * self.resolution_us() as u64
    }

    /// Convert to the wire representation
    pub fn report(&self) -> TimingReport {
        TimingReport {
            resolution_s: self.resolution_s,
            specified: self.specified.report(),
            digital: TickDomain {
                total: self.digital.total,
                exposure: self.digital.exposure,
            },
            adjusted: self.adjusted.report(),
        }
    }
}
