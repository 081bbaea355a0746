//! HD44780 character LCD driver
//!
//! Drives a 16x2 HD44780-compatible LCD in 4-bit mode. RW is expected to
//! be tied low, so the busy flag is never read and every command waits out
//! its worst-case execution time instead.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::backend::{DisplayBackend, DisplayError};

const COLS: u8 = 16;
const ROWS: u8 = 2;

/// DDRAM address of the first column of each row
const ROW_OFFSETS: [u8; ROWS as usize] = [0x00, 0x40];

/// HD44780 commands
#[allow(dead_code)]
mod cmd {
    pub const CLEAR: u8 = 0x01;
    pub const HOME: u8 = 0x02;
    pub const ENTRY_MODE: u8 = 0x04;
    pub const ENTRY_INCREMENT: u8 = 0x02;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const DISPLAY_ON: u8 = 0x04;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const TWO_LINES: u8 = 0x08;
    pub const SET_DDRAM: u8 = 0x80;
}

/// HD44780 LCD on six GPIO lines (RS, E, D4-D7)
pub struct Hd44780<P, D> {
    rs: P,
    en: P,
    data: [P; 4],
    delay: D,
    ready: bool,
}

impl<P, D> Hd44780<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver; call [`init`](Self::init) before drawing
    pub fn new(rs: P, en: P, data: [P; 4], delay: D) -> Self {
        Self {
            rs,
            en,
            data,
            delay,
            ready: false,
        }
    }

    /// Run the 4-bit initialisation sequence
    pub fn init(&mut self) -> Result<(), DisplayError> {
        self.rs.set_low().map_err(|_| DisplayError::Communication)?;
        self.en.set_low().map_err(|_| DisplayError::Communication)?;
        self.delay.delay_ms(50);

        // Three 8-bit function sets resynchronise the controller whatever
        // mode it powered up in, then switch to 4-bit
        self.write_nibble(0x03)?;
        self.delay.delay_us(4500);
        self.write_nibble(0x03)?;
        self.delay.delay_us(150);
        self.write_nibble(0x03)?;
        self.delay.delay_us(150);
        self.write_nibble(0x02)?;
        self.delay.delay_us(150);

        self.command(cmd::FUNCTION_SET | cmd::TWO_LINES)?;
        self.command(cmd::DISPLAY_CONTROL | cmd::DISPLAY_ON)?;
        self.command(cmd::ENTRY_MODE | cmd::ENTRY_INCREMENT)?;
        self.ready = true;
        self.clear()
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), DisplayError> {
        self.command(cmd::SET_DDRAM | (ROW_OFFSETS[row as usize] + col))
    }

    fn command(&mut self, byte: u8) -> Result<(), DisplayError> {
        self.rs.set_low().map_err(|_| DisplayError::Communication)?;
        self.write_byte(byte)?;
        // Clear and home take up to 1.52 ms, everything else 37 us
        if byte == cmd::CLEAR || byte == cmd::HOME {
            self.delay.delay_us(2000);
        }
        Ok(())
    }

    fn write_char(&mut self, byte: u8) -> Result<(), DisplayError> {
        self.rs.set_high().map_err(|_| DisplayError::Communication)?;
        self.write_byte(byte)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), DisplayError> {
        self.write_nibble(byte >> 4)?;
        self.write_nibble(byte & 0x0F)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn write_nibble(&mut self, nibble: u8) -> Result<(), DisplayError> {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            let result = if nibble & (1 << bit) != 0 {
                pin.set_high()
            } else {
                pin.set_low()
            };
            result.map_err(|_| DisplayError::Communication)?;
        }

        // Data is latched on the falling edge of E
        self.en.set_high().map_err(|_| DisplayError::Communication)?;
        self.delay.delay_us(1);
        self.en.set_low().map_err(|_| DisplayError::Communication)?;
        self.delay.delay_us(1);
        Ok(())
    }
}

impl<P, D> DisplayBackend for Hd44780<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    fn clear(&mut self) -> Result<(), DisplayError> {
        if !self.ready {
            return Err(DisplayError::NotInitialized);
        }
        self.command(cmd::CLEAR)
    }

    fn draw_text(&mut self, row: u8, col: u8, text: &str) -> Result<(), DisplayError> {
        if !self.ready {
            return Err(DisplayError::NotInitialized);
        }
        if row >= ROWS || col >= COLS {
            return Err(DisplayError::InvalidCoordinates);
        }

        self.set_cursor(row, col)?;
        for c in text.chars().take((COLS - col) as usize) {
            // The character ROM only matches ASCII
            let byte = if c.is_ascii() && !c.is_ascii_control() {
                c as u8
            } else {
                b'?'
            };
            self.write_char(byte)?;
        }
        Ok(())
    }

    fn dimensions(&self) -> (u8, u8) {
        (COLS, ROWS)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use heapless::Vec;

    const RS: usize = 0;
    const EN: usize = 1;

    /// Pin levels plus every nibble latched on a falling edge of E
    #[derive(Default)]
    struct Bus {
        levels: [bool; 6],
        latched: Vec<(bool, u8), 512>,
    }

    impl Bus {
        /// Pair latched nibbles into (rs, byte), skipping the init nibbles
        fn bytes(&self) -> Vec<(bool, u8), 256> {
            self.latched[4..]
                .chunks(2)
                .map(|pair| (pair[0].0, (pair[0].1 << 4) | pair[1].1))
                .collect()
        }
    }

    struct MockPin<'a> {
        index: usize,
        bus: &'a RefCell<Bus>,
    }

    impl embedded_hal::digital::ErrorType for MockPin<'_> {
        type Error = Infallible;
    }

    impl OutputPin for MockPin<'_> {
        fn set_low(&mut self) -> Result<(), Infallible> {
            let mut bus = self.bus.borrow_mut();
            if self.index == EN && bus.levels[EN] {
                let nibble = (0..4).fold(0u8, |n, bit| n | ((bus.levels[2 + bit] as u8) << bit));
                let rs = bus.levels[RS];
                let _ = bus.latched.push((rs, nibble));
            }
            bus.levels[self.index] = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.bus.borrow_mut().levels[self.index] = true;
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn lcd(bus: &RefCell<Bus>) -> Hd44780<MockPin<'_>, NoDelay> {
        let pin = |index| MockPin { index, bus };
        Hd44780::new(pin(RS), pin(EN), [pin(2), pin(3), pin(4), pin(5)], NoDelay)
    }

    #[test]
    fn test_init_sequence() {
        let bus = RefCell::new(Bus::default());
        let mut lcd = lcd(&bus);
        assert_eq!(lcd.clear(), Err(DisplayError::NotInitialized));

        lcd.init().unwrap();
        assert!(lcd.is_ready());

        let bus = bus.borrow();
        let init: Vec<u8, 4> = bus.latched[..4].iter().map(|(_, n)| *n).collect();
        assert_eq!(init, [0x03, 0x03, 0x03, 0x02]);
        assert_eq!(bus.bytes(), [(false, 0x28), (false, 0x0C), (false, 0x06), (false, 0x01)]);
    }

    #[test]
    fn test_draw_text_on_second_row() {
        let bus = RefCell::new(Bus::default());
        let mut lcd = lcd(&bus);
        lcd.init().unwrap();
        lcd.draw_text(1, 14, "Hi!").unwrap();

        let bytes = bus.borrow().bytes();
        assert_eq!(
            bytes[4..],
            [(false, 0xC0 | 14), (true, b'H'), (true, b'i')]
        );
    }

    #[test]
    fn test_non_ascii_replaced() {
        let bus = RefCell::new(Bus::default());
        let mut lcd = lcd(&bus);
        lcd.init().unwrap();
        lcd.draw_text(0, 0, "µs").unwrap();

        let bytes = bus.borrow().bytes();
        assert_eq!(bytes[4..], [(false, 0x80), (true, b'?'), (true, b's')]);
    }

    #[test]
    fn test_write_row_pads_to_width() {
        let bus = RefCell::new(Bus::default());
        let mut lcd = lcd(&bus);
        lcd.init().unwrap();
        lcd.write_row(0, "Idle").unwrap();

        let bytes = bus.borrow().bytes();
        assert_eq!(bytes.len(), 4 + 1 + 16);
        assert_eq!(bytes[5..9], [(true, b'I'), (true, b'd'), (true, b'l'), (true, b'e')]);
        assert!(bytes[9..].iter().all(|&b| b == (true, b' ')));
        assert_eq!(lcd.draw_text(2, 0, "x"), Err(DisplayError::InvalidCoordinates));
    }
}
