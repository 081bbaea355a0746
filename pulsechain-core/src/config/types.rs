//! Configuration type definitions

use pulsechain_hal::EngineLimits;

use crate::chain::Polarity;
use crate::scheduler::{PlaybackSettings, DEFAULT_MAX_TICKS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// GPIO pin with optional inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// GPIO pin number (0-29 for RP2040)
    pub pin: u8,
    /// Pin is active-low
    pub inverted: bool,
}

impl PinConfig {
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
        }
    }

    /// Create an inverted (active-low) pin
    pub const fn inverted(pin: u8) -> Self {
        Self {
            pin,
            inverted: true,
        }
    }
}

/// Exposure output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputConfig {
    /// Output pin; inverted means an ON tick drives it low
    pub pin: PinConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pin: PinConfig::inverted(14),
        }
    }
}

impl OutputConfig {
    pub fn polarity(&self) -> Polarity {
        Polarity::from_active_low(self.pin.inverted)
    }
}

/// Pulse engine capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Pulses per waveform
    pub max_pulses: u32,
    /// Duration ceiling per waveform in microseconds (None = unbounded)
    pub max_micros: Option<u64>,
    /// Longest sequence that may be staged
    pub max_ticks: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pulses: 4000,
            max_micros: None,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }
}

/// Command link UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub baud_rate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tx_pin: 0,
            rx_pin: 1,
            baud_rate: 115_200,
        }
    }
}

/// Status display timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusConfig {
    /// How often progress lines are rebuilt
    pub refresh_ms: u32,
    /// How long each rotating line stays on screen
    pub rotation_ms: u32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 4000,
            rotation_ms: 2000,
        }
    }
}

/// Complete device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceConfig {
    pub output: OutputConfig,
    pub engine: EngineConfig,
    pub link: LinkConfig,
    pub status: StatusConfig,
}

impl DeviceConfig {
    /// Scheduler settings derived from this config
    pub fn playback(&self) -> PlaybackSettings {
        PlaybackSettings {
            polarity: self.output.polarity(),
            max_ticks: self.engine.max_ticks,
        }
    }

    /// Engine limits, capped by what the engine itself supports
    pub fn engine_limits(&self, hardware: EngineLimits) -> EngineLimits {
        let max_micros = match (self.engine.max_micros, hardware.max_micros) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        EngineLimits {
            max_pulses: self.engine.max_pulses.min(hardware.max_pulses),
            max_micros,
            max_waveforms: hardware.max_waveforms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_is_active_low() {
        let config = DeviceConfig::default();
        assert_eq!(config.output.pin.pin, 14);
        assert_eq!(config.playback().polarity, Polarity::ActiveLow);
    }

    #[test]
    fn test_engine_limits_take_tighter_bound() {
        let mut config = DeviceConfig::default();
        config.engine.max_pulses = 1000;
        config.engine.max_micros = Some(5_000_000);

        let limits = config.engine_limits(EngineLimits {
            max_pulses: 2000,
            max_micros: None,
            max_waveforms: 2,
        });
        assert_eq!(limits.max_pulses, 1000);
        assert_eq!(limits.max_micros, Some(5_000_000));

        let limits = config.engine_limits(EngineLimits {
            max_pulses: 500,
            max_micros: Some(1_000_000),
            max_waveforms: 2,
        });
        assert_eq!(limits.max_pulses, 500);
        assert_eq!(limits.max_micros, Some(1_000_000));
    }
}
