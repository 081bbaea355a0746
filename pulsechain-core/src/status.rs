//! Progress lines for the status display

use core::fmt::Write;

use heapless::String;

use crate::scheduler::Progress;
use crate::traits::StatusDisplay;

/// Characters per display line
pub const LINE_LEN: usize = 16;

/// Display row used for playback progress
pub const PROGRESS_ROW: u8 = 1;

/// A single display line
pub type Line = String<LINE_LEN>;

/// Format the progress line, e.g. `Prog @ 12.3%`
pub fn progress_line(progress: &Progress) -> Line {
    let mut line = Line::new();
    let permille = libm::roundf(progress.chain * 1000.0) as u32;
    // A 16 character line always fits
    let _ = write!(line, "Prog @ {}.{}%", permille / 10, permille % 10);
    line
}

/// Format a remaining time as `ETA h:mm:ss`
pub fn eta_line(eta_us: u64) -> Line {
    let mut line = Line::new();
    let secs = eta_us.div_ceil(1_000_000);
    let _ = write!(
        line,
        "ETA {}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    line
}

/// Pushes progress to a status display at a fixed refresh period
#[derive(Debug, Clone)]
pub struct StatusReporter {
    refresh_us: u64,
    rotation_ms: u32,
    last_update_us: Option<u64>,
}

impl StatusReporter {
    pub fn new(refresh_ms: u32, rotation_ms: u32) -> Self {
        Self {
            refresh_us: refresh_ms as u64 * 1000,
            rotation_ms,
            last_update_us: None,
        }
    }

    /// Update the display if the refresh period has elapsed
    ///
    /// Returns true when the display was written.
    pub fn update<D: StatusDisplay + ?Sized>(
        &mut self,
        now_us: u64,
        progress: &Progress,
        display: &mut D,
    ) -> bool {
        if let Some(last) = self.last_update_us {
            if now_us.saturating_sub(last) < self.refresh_us {
                return false;
            }
        }
        self.last_update_us = Some(now_us);

        match progress.eta_us {
            Some(eta) if progress.is_running() => {
                let prog = progress_line(progress);
                let eta = eta_line(eta);
                display.set_row(PROGRESS_ROW, &[prog.as_str(), eta.as_str()], self.rotation_ms);
            }
            _ => display.set_row(PROGRESS_ROW, &["Idle"], self.rotation_ms),
        }
        true
    }

    /// Force the next update to write regardless of the refresh period
    pub fn invalidate(&mut self) {
        self.last_update_us = None;
    }
}
