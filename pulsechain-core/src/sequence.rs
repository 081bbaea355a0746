//! ON/OFF tick sequences
//!
//! A [`Sequence`] holds one bit per tick. Two policies build it from a
//! digital timing `(n, m)`: `n` ticks in total, `m` of them ON.
//!
//! - Regular: one ON tick every `f = n / m` ticks, `m` times. The run ends
//!   after the last period, so up to `m - 1` trailing ticks of the digital
//!   total are not played.
//! - Random: `m` ON ticks at uniformly random positions among `n`.

use alloc::vec;
use alloc::vec::Vec;

use pulsechain_protocol::{SequencePage, SequencePolicy};
use rand::Rng;

use crate::error::SchedulerError;
use crate::timing::Timing;

const WORD_BITS: u32 = 32;

/// A bit-packed sequence of ON/OFF ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    words: Vec<u32>,
    len: u32,
    on_count: u32,
}

impl Sequence {
    /// Create a sequence of `len` OFF ticks
    pub fn off(len: u32) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS) as usize],
            len,
            on_count: 0,
        }
    }

    /// Build a sequence from explicit ticks (`true` = ON)
    pub fn from_ticks<I>(ticks: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut words = Vec::new();
        let mut len = 0u32;
        let mut on_count = 0u32;
        for on in ticks {
            if len % WORD_BITS == 0 {
                words.push(0);
            }
            if on {
                if let Some(word) = words.last_mut() {
                    *word |= 1 << (len % WORD_BITS);
                }
                on_count += 1;
            }
            len += 1;
        }
        Self {
            words,
            len,
            on_count,
        }
    }

    /// Regular policy: `m` evenly spaced ON ticks
    ///
    /// With period `f = n / m`, each of the `m` units is one ON tick
    /// followed by `f - 1` OFF ticks, giving `m * f` ticks. That is never
    /// more than `a * f` for `a = n / f` whole periods, and never more
    /// than `n`.
    ///
    /// Fails with [`SchedulerError::InvalidSequence`] when `m == 0`.
    pub fn regular(n: u32, m: u32) -> Result<Self, SchedulerError> {
        if m == 0 || m > n {
            return Err(SchedulerError::InvalidSequence);
        }

        let period = n / m;
        let mut seq = Self::off(m * period);
        for unit in 0..m {
            seq.set(unit * period, true);
        }
        Ok(seq)
    }

    /// Random policy: `m` ON ticks uniformly placed among `n`
    ///
    /// Starts from `m` ON ticks followed by `n - m` OFF ticks and applies a
    /// Knuth shuffle, so every arrangement is equally likely.
    pub fn random<R: Rng + ?Sized>(n: u32, m: u32, rng: &mut R) -> Result<Self, SchedulerError> {
        if m > n {
            return Err(SchedulerError::InvalidSequence);
        }

        let mut seq = Self::off(n);
        for i in 0..m {
            seq.set(i, true);
        }
        for i in 0..n.saturating_sub(1) {
            let j = rng.gen_range(i..n);
            seq.swap(i, j);
        }
        Ok(seq)
    }

    /// Build a sequence for a digital timing using the given policy
    pub fn generate<R: Rng + ?Sized>(
        policy: SequencePolicy,
        timing: &Timing,
        rng: &mut R,
    ) -> Result<Self, SchedulerError> {
        let digital = timing.digital();
        match policy {
            SequencePolicy::Regular => Self::regular(digital.total, digital.exposure),
            SequencePolicy::Random => Self::random(digital.total, digital.exposure, rng),
        }
    }

    /// Number of ticks
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of ON ticks
    pub fn on_count(&self) -> u32 {
        self.on_count
    }

    /// Get a tick (`true` = ON)
    pub fn get(&self, index: u32) -> Option<bool> {
        (index < self.len).then(|| self.bit(index))
    }

    /// Iterate all ticks in order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.range(0, self.len)
    }

    /// Iterate `len` ticks starting at `start`, clipped to the sequence
    pub fn range(&self, start: u32, len: u32) -> impl Iterator<Item = bool> + '_ {
        let end = start.saturating_add(len).min(self.len);
        (start.min(end)..end).map(move |i| self.bit(i))
    }

    /// Pack the ticks from `offset` onwards into a query page
    pub fn page(&self, offset: u32) -> SequencePage {
        SequencePage::pack(
            self.len,
            self.on_count,
            offset,
            self.range(offset, self.len.saturating_sub(offset)),
        )
    }

    fn bit(&self, index: u32) -> bool {
        let word = self.words[(index / WORD_BITS) as usize];
        word & (1 << (index % WORD_BITS)) != 0
    }

    fn set(&mut self, index: u32, on: bool) {
        let was_on = self.bit(index);
        let word = &mut self.words[(index / WORD_BITS) as usize];
        let mask = 1 << (index % WORD_BITS);
        if on {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        match (was_on, on) {
            (false, true) => self.on_count += 1,
            (true, false) => self.on_count -= 1,
            _ => {}
        }
    }

    fn swap(&mut self, a: u32, b: u32) {
        let (va, vb) = (self.bit(a), self.bit(b));
        if va != vb {
            self.set(a, vb);
            self.set(b, va);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ticks(seq: &Sequence) -> Vec<bool> {
        seq.iter().collect()
    }

    #[test]
    fn test_regular_half_duty() {
        let seq = Sequence::regular(10, 5).unwrap();
        assert_eq!(seq.len(), 10);
        assert_eq!(seq.on_count(), 5);
        assert_eq!(
            ticks(&seq),
            [true, false, true, false, true, false, true, false, true, false]
        );
    }

    #[test]
    fn test_regular_truncates_tail() {
        // Period 3, four units, one tick of the total left unplayed
        let seq = Sequence::regular(13, 4).unwrap();
        assert_eq!(seq.len(), 12);
        assert_eq!(seq.on_count(), 4);
        assert_eq!(seq.get(0), Some(true));
        assert_eq!(seq.get(3), Some(true));
        assert_eq!(seq.get(4), Some(false));
        assert_eq!(seq.get(12), None);
    }

    #[test]
    fn test_regular_length_is_m_periods() {
        // f = 2 and a = 5 whole periods fit, but only m = 4 units are
        // played so the ON count stays exact
        let (n, m) = (10, 4);
        let f = n / m;
        let a = n / f;
        assert_eq!((f, a), (2, 5));

        let seq = Sequence::regular(n, m).unwrap();
        assert_eq!(seq.len(), m * f);
        assert!(seq.len() <= a * f);
        assert_eq!(seq.on_count(), m);
        assert_eq!(ticks(&seq), [true, false, true, false, true, false, true, false]);
    }

    #[test]
    fn test_regular_full_exposure() {
        let seq = Sequence::regular(7, 7).unwrap();
        assert!(seq.iter().all(|on| on));
    }

    #[test]
    fn test_regular_zero_exposure_rejected() {
        assert_eq!(Sequence::regular(10, 0), Err(SchedulerError::InvalidSequence));
        assert_eq!(Sequence::regular(0, 0), Err(SchedulerError::InvalidSequence));
    }

    #[test]
    fn test_random_extremes() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(Sequence::random(50, 0, &mut rng).unwrap().iter().all(|on| !on));
        assert!(Sequence::random(50, 50, &mut rng).unwrap().iter().all(|on| on));
        assert!(Sequence::random(0, 0, &mut rng).unwrap().is_empty());
        assert_eq!(
            Sequence::random(3, 4, &mut rng),
            Err(SchedulerError::InvalidSequence)
        );
    }

    #[test]
    fn test_random_is_roughly_uniform() {
        // 5 choose 2 = 10 arrangements, 20_000 draws, ~2000 expected each
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let mut counts = [0u32; 32];
        let draws = 20_000;
        for _ in 0..draws {
            let seq = Sequence::random(5, 2, &mut rng).unwrap();
            let mask = seq
                .iter()
                .enumerate()
                .fold(0usize, |acc, (i, on)| acc | ((on as usize) << i));
            counts[mask] += 1;
        }

        let seen: Vec<u32> = counts.iter().copied().filter(|&c| c > 0).collect();
        assert_eq!(seen.len(), 10);

        let expected = draws as f64 / 10.0;
        let chi_square: f64 = seen
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();
        // 9 degrees of freedom, p = 0.001 critical value is 27.88
        assert!(chi_square < 27.88, "chi square {}", chi_square);
    }

    #[test]
    fn test_from_ticks_and_range() {
        let seq = Sequence::from_ticks([true, false, false, true, true]);
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.on_count(), 3);
        assert_eq!(seq.range(3, 10).collect::<Vec<_>>(), [true, true]);
        assert_eq!(seq.range(9, 2).count(), 0);
    }

    #[test]
    fn test_page_from_offset() {
        let seq = Sequence::regular(40, 10).unwrap();
        let page = seq.page(36);
        assert_eq!(page.total_ticks, 40);
        assert_eq!(page.on_ticks, 10);
        assert_eq!(page.count, 4);
        assert_eq!(page.tick(0), Some(true));
        assert_eq!(page.next_offset(), None);

        assert_eq!(seq.page(100).count, 0);
    }

    proptest! {
        #[test]
        fn prop_random_exact_counts(n in 1u32..2000, frac in 0.0f64..=1.0, seed: u64) {
            let m = (n as f64 * frac) as u32;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let seq = Sequence::random(n, m, &mut rng).unwrap();
            prop_assert_eq!(seq.len(), n);
            prop_assert_eq!(seq.on_count(), m);
            prop_assert_eq!(seq.iter().filter(|&on| on).count() as u32, m);
        }

        #[test]
        fn prop_regular_exact_on_count(n in 1u32..5000, m_seed in 1u32..5000) {
            let m = 1 + m_seed % n;
            let seq = Sequence::regular(n, m).unwrap();
            prop_assert_eq!(seq.on_count(), m);
            prop_assert_eq!(seq.iter().filter(|&on| on).count() as u32, m);
            let f = n / m;
            prop_assert_eq!(seq.len(), m * f);
            prop_assert!(seq.len() <= (n / f) * f);
            prop_assert!(n - seq.len() < m);
        }
    }
}
