//! Status display sink

/// Row-oriented status display
///
/// Each row shows one of a list of lines at a time, rotating to the next
/// line every `rotation_ms`. Calls are fire-and-forget; the display owns
/// its own refresh cadence and may be called at any rate.
pub trait StatusDisplay {
    /// Replace the rotating lines of a row
    ///
    /// Rows or lines beyond the display's capacity are ignored.
    fn set_row(&mut self, row: u8, lines: &[&str], rotation_ms: u32);
}
