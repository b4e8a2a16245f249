use crate::lcd::hd44780::charmap::{rom_code, PLACEHOLDER};
use crate::lcd::hd44780::config::LcdConfig;
use crate::lcd::hd44780::cursor::Cursor;
use crate::lcd::hd44780::driver::{ExecTime, HD44780Driver};
use crate::lcd::hd44780::format::LcdWrite;
use crate::lcd::hd44780::glyph::{check_slot, Glyph, GlyphBinding, GlyphRegistry};
use crate::lcd::hd44780::utf8::Utf8Decoder;
use crate::GpioResult;
use log::debug;

/// A 2x16 text display on top of an [HD44780Driver].
///
/// Keeps the cursor, the partial UTF-8 sequence and the custom glyph slots between calls.
/// Text wraps from row 1 to row 2, and writing past the end of row 2 clears the display and
/// continues at the top left. `\n` moves to row 2, or past the end when already on row 2.
///
/// Protocol-level oddities never fail: undecodable text shows a block, out-of-range
/// positions are clamped. Errors come only from the GPIO backend.
#[derive(Debug)]
pub struct Lcd<D: HD44780Driver> {
    driver: D,
    config: LcdConfig,
    cursor: Cursor,
    decoder: Utf8Decoder,
    glyphs: GlyphRegistry,
}

impl<D: HD44780Driver> Lcd<D> {
    /// Wraps a driver. Nothing is sent until [Lcd::init].
    ///
    /// Returns [GpioError::InvalidArgument](crate::GpioError::InvalidArgument) if a glyph
    /// binding names a slot above 7.
    pub fn new(driver: D, config: LcdConfig) -> GpioResult<Self> {
        config.validate()?;

        let mut glyphs = GlyphRegistry::new();
        for binding in &config.glyphs {
            glyphs.reserve(binding.code_point, binding.slot)?;
        }

        Ok(Lcd { driver, config, cursor: Cursor::LINE1, decoder: Utf8Decoder::new(), glyphs })
    }

    /// Brings the controller up and writes the configured glyphs.
    pub fn init(&mut self) -> GpioResult<()> {
        if let Some(sync) = self.config.sync {
            self.driver.set_sync_mode(sync)?;
        }
        self.driver.init()?;
        self.cursor = Cursor::LINE1;
        self.decoder = Utf8Decoder::new();

        for binding in self.config.glyphs.clone() {
            self.register_glyph(binding.slot, binding.glyph)?;
        }

        debug!("Display ready, {} custom glyph(s)", self.config.glyphs.len());
        Ok(())
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn config(&self) -> &LcdConfig {
        &self.config
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn glyphs(&self) -> &GlyphRegistry {
        &self.glyphs
    }

    fn move_to(&mut self, cursor: Cursor) -> GpioResult<()> {
        self.cursor = cursor;
        self.driver.set_ddram_address(cursor.ddram_address())
    }

    /// Start of row 1.
    pub fn line1(&mut self) -> GpioResult<()> {
        self.move_to(Cursor::LINE1)
    }

    /// Start of row 2.
    pub fn line2(&mut self) -> GpioResult<()> {
        self.move_to(Cursor::LINE2)
    }

    /// Moves to a 1-based `row` and `col`, clamped onto the display.
    pub fn goto(&mut self, row: u8, col: u8) -> GpioResult<()> {
        self.move_to(Cursor::at(row, col))
    }

    /// Moves relative to the cursor, see [Cursor::moved_by].
    pub fn move_by(&mut self, drow: i16, dcol: i16) -> GpioResult<()> {
        self.move_to(self.cursor.moved_by(drow, dcol))
    }

    pub fn forward(&mut self) -> GpioResult<()> {
        self.move_to(self.cursor.forward())
    }

    pub fn back(&mut self) -> GpioResult<()> {
        self.move_to(self.cursor.back())
    }

    /// Start of the current row.
    pub fn home(&mut self) -> GpioResult<()> {
        self.move_to(self.cursor.home())
    }

    /// Blanks the display and moves to the top left.
    pub fn clear(&mut self) -> GpioResult<()> {
        self.driver.clear_display()?;
        self.cursor = Cursor::LINE1;
        Ok(())
    }

    /// Blanks one row (1 or 2, clamped) and leaves the cursor where it was.
    pub fn erase(&mut self, row: u8) -> GpioResult<()> {
        let saved = self.cursor;
        self.goto(row, 1)?;
        for _ in 0..Cursor::COLUMNS {
            self.put_code(b' ')?;
        }
        self.move_to(saved)
    }

    /// Feeds one byte of UTF-8 text. Multi-byte sequences show once complete.
    pub fn write_byte(&mut self, byte: u8) -> GpioResult<()> {
        match self.decoder.push(byte) {
            Some(c) => self.put_char(c),
            None => Ok(()),
        }
    }

    /// Writes one character. Goes through the same decoder as [Lcd::write_byte], so it
    /// completes (or breaks) a pending multi-byte sequence like any other byte would.
    pub fn write_char(&mut self, c: char) -> GpioResult<()> {
        let mut buf = [0; 4];
        for &byte in c.encode_utf8(&mut buf).as_bytes() {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    pub fn write_str(&mut self, text: &str) -> GpioResult<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Feeds raw bytes that may split UTF-8 sequences anywhere.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> GpioResult<()> {
        bytes.iter().try_for_each(|&byte| self.write_byte(byte))
    }

    /// Writes to the display only if it's bound as error stream.
    pub fn write_error_str(&mut self, text: &str) -> GpioResult<()> {
        if !self.config.error_stream {
            return Ok(());
        }
        self.write_str(text)
    }

    /// Device code shown for `c`: a reserved glyph slot, a ROM code, or the placeholder.
    pub fn code_for(&self, c: char) -> u8 {
        self.glyphs.code_for(c).unwrap_or_else(|| rom_code(c))
    }

    fn put_char(&mut self, c: char) -> GpioResult<()> {
        if c == '\n' {
            return self.move_to(self.cursor.newline());
        }
        let code = self.code_for(c);
        if code == PLACEHOLDER && c != '▮' && c != '■' {
            debug!("No glyph for {:?}, showing placeholder", c);
        }
        self.put_code(code)
    }

    fn put_code(&mut self, code: u8) -> GpioResult<()> {
        if self.cursor.is_past_end() {
            self.clear()?;
        } else if self.cursor == Cursor::LINE2 {
            // The address counter continues invisibly past column 16 of row 1
            self.driver.set_ddram_address(Cursor::LINE2.ddram_address())?;
        }
        self.driver.send_data(code)?;
        self.cursor = self.cursor.advanced();
        Ok(())
    }

    /// Row 1 becomes a bar filled to `percent` (clamped to 100), row 2 is erased. The cursor
    /// ends up at the start of row 2.
    pub fn draw_bar(&mut self, percent: u8) -> GpioResult<()> {
        let filled = percent.min(100) as u16 * Cursor::COLUMNS as u16 / 100;

        self.line1()?;
        for _ in 0..filled {
            self.write_char('▮')?;
        }
        while self.cursor.position() < Cursor::COLUMNS {
            self.write_byte(b' ')?;
        }
        self.erase(2)
    }

    /// Writes `glyph` to CGRAM `slot` (0..=7). Cells already showing the slot change at once.
    pub fn register_glyph(&mut self, slot: u8, glyph: Glyph) -> GpioResult<()> {
        check_slot(slot)?;
        debug!("Registering glyph {:016x} in slot {}", glyph.to_bits(), slot);

        self.driver.set_cgram_address(slot * 8)?;
        for &row in glyph.rows() {
            self.driver.send_data(row)?;
        }
        self.glyphs.record(slot, glyph)?;

        // Data writes go to CGRAM until a DDRAM address is set again
        self.driver.set_ddram_address(self.cursor.ddram_address())
    }

    /// Registers the glyph and routes its code point to the slot from now on. The binding
    /// joins the config, replacing one for the same code point, so [Lcd::init] restores it.
    pub fn bind_glyph(&mut self, binding: GlyphBinding) -> GpioResult<()> {
        self.register_glyph(binding.slot, binding.glyph)?;
        self.glyphs.reserve(binding.code_point, binding.slot)?;
        self.config.glyphs.retain(|bound| bound.code_point != binding.code_point);
        self.config.glyphs.push(binding);
        Ok(())
    }

    /// Sends a raw instruction and waits the longest execution time.
    ///
    /// The cursor model isn't updated. After anything that moves the address counter,
    /// restore a known position with e.g. [Lcd::goto] or [Lcd::clear].
    pub fn command(&mut self, command: u8) -> GpioResult<()> {
        self.driver.send_command(command, ExecTime::Slow)
    }
}

impl<D: HD44780Driver> LcdWrite for Lcd<D> {
    fn write_byte(&mut self, byte: u8) -> GpioResult<()> {
        Lcd::write_byte(self, byte)
    }
}

impl<D: HD44780Driver> core::fmt::Write for Lcd<D> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        Lcd::write_str(self, s).map_err(|_| core::fmt::Error)
    }
}
