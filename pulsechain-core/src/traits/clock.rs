//! Monotonic time source

/// Monotonic microsecond clock
///
/// Progress is computed from timestamps rather than by counting loop
/// iterations, so the clock must never go backwards.
pub trait Clock {
    /// Microseconds since an arbitrary fixed epoch
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}
