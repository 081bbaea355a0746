//! PIO pulse program and FIFO word encoding
//!
//! The pulse engine streams 32-bit words into a state machine's TX FIFO.
//! Each word holds one run of constant level:
//!
//! ```text
//!  31                                1   0
//! ┌───────────────────────────────────┬─────┐
//! │ loop count (cycles - 4)           │level│
//! └───────────────────────────────────┴─────┘
//! ```
//!
//! The program pulls a word, drives the level bit onto the pin, then spins
//! on the loop count. A word with loop count `x` takes `x + 4` PIO cycles,
//! so runs are exact to one PIO clock (40 ns). When the FIFO runs dry the
//! state machine stalls on `pull` and the pin holds its last level.

use pulsechain_hal::{EngineError, Level, Pulse};

/// System clock frequency (RP2040 default)
pub const SYS_CLK_HZ: u32 = 125_000_000;

/// PIO clock; an integer divider of the system clock
pub const PIO_CLK_HZ: u32 = 25_000_000;

/// System clock cycles per PIO cycle
pub const CLOCK_DIVIDER: u16 = (SYS_CLK_HZ / PIO_CLK_HZ) as u16;

/// PIO cycles per microsecond
pub const CYCLES_PER_US: u64 = (PIO_CLK_HZ / 1_000_000) as u64;

/// Fixed cost of one word: pull, two outs, final jmp
pub const MIN_WORD_CYCLES: u64 = 4;

/// Longest run a single word can hold (31-bit loop count)
pub const MAX_WORD_CYCLES: u64 = (1 << 31) - 1 + MIN_WORD_CYCLES;

/// Encode one FIFO word
///
/// `cycles` must be in `MIN_WORD_CYCLES..=MAX_WORD_CYCLES`.
pub fn encode_word(level: Level, cycles: u64) -> u32 {
    let count = (cycles - MIN_WORD_CYCLES) as u32;
    (count << 1) | level.is_high() as u32
}

/// Append the words for one run of constant level
///
/// Runs longer than a single word are split; every chunk keeps at least
/// the minimum word length.
fn push_run<F>(level: Level, duration_us: u64, push: &mut F) -> Result<(), EngineError>
where
    F: FnMut(u32) -> Result<(), EngineError>,
{
    let mut remaining = duration_us * CYCLES_PER_US;
    while remaining > MAX_WORD_CYCLES {
        let chunk = MAX_WORD_CYCLES.min(remaining - MIN_WORD_CYCLES);
        push(encode_word(level, chunk))?;
        remaining -= chunk;
    }
    push(encode_word(level, remaining))
}

/// Compile pulses into FIFO words, merging adjacent pulses of equal level
///
/// Zero-length pulses are counted but produce no output. Returns the
/// number of input pulses and the total duration in microseconds.
pub fn compile<I, F>(pulses: I, mut push: F) -> Result<(u32, u64), EngineError>
where
    I: IntoIterator<Item = Pulse>,
    F: FnMut(u32) -> Result<(), EngineError>,
{
    let mut count = 0u32;
    let mut total_us = 0u64;
    let mut run: Option<(Level, u64)> = None;

    for pulse in pulses {
        count += 1;
        if pulse.duration_us == 0 {
            continue;
        }
        let duration_us = pulse.duration_us as u64;
        total_us += duration_us;
        run = match run {
            Some((level, us)) if level == pulse.level => Some((level, us + duration_us)),
            Some((level, us)) => {
                push_run(level, us, &mut push)?;
                Some((pulse.level, duration_us))
            }
            None => Some((pulse.level, duration_us)),
        };
    }
    if let Some((level, us)) = run {
        push_run(level, us, &mut push)?;
    }

    Ok((count, total_us))
}
