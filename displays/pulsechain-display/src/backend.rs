//! Display backend trait
//!
//! Defines the interface for character displays.

/// Display backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Communication error with display
    Communication,
    /// Invalid coordinates or dimensions
    InvalidCoordinates,
    /// Display not initialized
    NotInitialized,
}

/// Display backend trait
///
/// Provides a hardware-agnostic interface for text displays.
pub trait DisplayBackend {
    /// Clear the entire display
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Draw text at the specified row and column
    ///
    /// Text running past the last column is cut off.
    fn draw_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError>;

    /// Flush buffered content to the display
    ///
    /// Unbuffered displays write through and can leave this as is.
    fn flush(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Get the display dimensions
    ///
    /// Returns (columns, rows) in character units
    fn dimensions(&self) -> (u8, u8);

    /// Check if the display is ready
    fn is_ready(&self) -> bool;

    /// Replace a whole row, blanking whatever the new text does not cover
    fn write_row(&mut self, row: u8, text: &str) -> Result<(), DisplayError> {
        let (cols, _) = self.dimensions();
        let mut padded: heapless::String<64> = heapless::String::new();
        for c in text.chars().take(cols as usize) {
            padded.push(c).map_err(|_| DisplayError::InvalidCoordinates)?;
        }
        while padded.chars().count() < cols as usize {
            padded.push(' ').map_err(|_| DisplayError::InvalidCoordinates)?;
        }
        self.draw_text(row, 0, &padded)
    }
}
