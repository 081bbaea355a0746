//! Rotating status rows
//!
//! Each row holds a small set of lines that take turns on screen at the
//! row's own rotation interval. Writers replace a row's lines at any rate;
//! only `tick` touches the hardware.

use heapless::Vec;
use pulsechain_core::status::{Line, LINE_LEN};
use pulsechain_core::traits::StatusDisplay;

use crate::backend::{DisplayBackend, DisplayError};

/// Rows on the status display
pub const BOARD_ROWS: usize = 2;

/// Lines a single row can rotate through
pub const MAX_ROTATING: usize = 4;

#[derive(Debug, Clone, Default)]
struct Row {
    lines: Vec<Line, MAX_ROTATING>,
    index: usize,
    rotation_ms: u32,
    shown_at_ms: Option<u64>,
    dirty: bool,
}

impl Row {
    fn current(&self) -> &str {
        self.lines.get(self.index).map_or("", |l| l.as_str())
    }

    fn matches(&self, lines: &[&str], rotation_ms: u32) -> bool {
        self.rotation_ms == rotation_ms
            && self.lines.len() == lines.len().min(MAX_ROTATING)
            && self
                .lines
                .iter()
                .zip(lines)
                .all(|(have, want)| have.as_str() == truncate(want))
    }

    fn due(&self, now_ms: u64) -> bool {
        if self.lines.len() < 2 || self.rotation_ms == 0 {
            return false;
        }
        self.shown_at_ms
            .is_some_and(|t| now_ms.saturating_sub(t) >= self.rotation_ms as u64)
    }
}

/// Cut a line to the display width on a char boundary
fn truncate(text: &str) -> &str {
    if text.len() <= LINE_LEN {
        return text;
    }
    let mut end = LINE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Status display made of independently rotating rows
pub struct StatusBoard<B> {
    backend: B,
    rows: [Row; BOARD_ROWS],
}

impl<B: DisplayBackend> StatusBoard<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rows: Default::default(),
        }
    }

    /// Clear the display and mark every row for redraw
    pub fn init(&mut self) -> Result<(), DisplayError> {
        self.backend.clear()?;
        for row in &mut self.rows {
            row.dirty = true;
        }
        Ok(())
    }

    /// Replace the lines a row rotates through
    ///
    /// Rotation restarts at the first line. Writing the same lines again
    /// keeps the current rotation phase. A `rotation_ms` of 0 pins the
    /// first line.
    pub fn set_lines(&mut self, row: u8, lines: &[&str], rotation_ms: u32) {
        let Some(state) = self.rows.get_mut(row as usize) else {
            return;
        };
        if state.matches(lines, rotation_ms) {
            return;
        }

        state.lines.clear();
        for text in lines.iter().take(MAX_ROTATING) {
            let mut line = Line::new();
            // Truncated to LINE_LEN bytes, always fits
            let _ = line.push_str(truncate(text));
            let _ = state.lines.push(line);
        }
        state.index = 0;
        state.rotation_ms = rotation_ms;
        state.shown_at_ms = None;
        state.dirty = true;
    }

    /// Blank a row
    pub fn reset_row(&mut self, row: u8) {
        self.set_lines(row, &[], 0);
    }

    /// Advance rotation and redraw changed rows
    ///
    /// Returns true if anything was written to the display.
    pub fn tick(&mut self, now_ms: u64) -> Result<bool, DisplayError> {
        let mut rendered = false;

        for (index, row) in self.rows.iter_mut().enumerate() {
            if !row.dirty && row.due(now_ms) {
                row.index = (row.index + 1) % row.lines.len();
                row.dirty = true;
            }
            if row.dirty {
                self.backend.write_row(index as u8, row.current())?;
                row.shown_at_ms = Some(now_ms);
                row.dirty = false;
                rendered = true;
            }
        }

        if rendered {
            self.backend.flush()?;
        }
        Ok(rendered)
    }

    /// Line a row is currently showing
    pub fn current_line(&self, row: u8) -> Option<&str> {
        self.rows.get(row as usize).map(Row::current)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: DisplayBackend> StatusDisplay for StatusBoard<B> {
    fn set_row(&mut self, row: u8, lines: &[&str], rotation_ms: u32) {
        self.set_lines(row, lines, rotation_ms);
    }
}
