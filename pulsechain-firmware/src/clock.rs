//! Embassy time driver as the scheduler clock

use embassy_time::Instant;
use pulsechain_core::traits::Clock;

/// Microseconds since boot from the RP2040 timer
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}
