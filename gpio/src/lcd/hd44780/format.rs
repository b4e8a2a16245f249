//! Number formatting without `core::fmt`, written digit by digit through the character
//! writer so line wrapping and the cursor model behave exactly like for text.
//!
//! `write!` works too since [Lcd](super::Lcd) implements [core::fmt::Write], but these
//! helpers don't allocate and keep widths fixed where a display needs them.
use crate::GpioResult;

fn hex_digit(nibble: u8) -> u8 {
    match nibble & 0x0F {
        digit @ 0..=9 => b'0' + digit,
        digit => b'a' + digit - 10,
    }
}

/// A byte sink with formatting helpers on top.
pub trait LcdWrite {
    /// Feeds one byte of UTF-8 text.
    fn write_byte(&mut self, byte: u8) -> GpioResult<()>;

    /// The low 4 bits as one lowercase hex digit.
    fn write_hex_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        self.write_byte(hex_digit(nibble))
    }

    /// Two hex digits.
    fn write_hex_byte(&mut self, byte: u8) -> GpioResult<()> {
        self.write_hex_nibble(byte >> 4)?;
        self.write_hex_nibble(byte)
    }

    /// Four hex digits.
    fn write_hex_word(&mut self, word: u16) -> GpioResult<()> {
        self.write_hex_byte((word >> 8) as u8)?;
        self.write_hex_byte(word as u8)
    }

    /// Hex without leading zeros, `0` for zero.
    fn write_hex(&mut self, number: u16) -> GpioResult<()> {
        let digits = (16 - number.leading_zeros()).div_ceil(4).max(1);
        for shift in (0..digits).rev() {
            self.write_hex_nibble((number >> (shift * 4)) as u8)?;
        }
        Ok(())
    }

    /// `0x` and eight hex digits.
    fn write_hex32(&mut self, number: u32) -> GpioResult<()> {
        self.write_byte(b'0')?;
        self.write_byte(b'x')?;
        self.write_hex_word((number >> 16) as u16)?;
        self.write_hex_word(number as u16)
    }

    /// Decimal without leading zeros, `0` for zero.
    fn write_dec(&mut self, number: u16) -> GpioResult<()> {
        write_unsigned(self, number as u64)
    }

    /// Converts an ADC-style reading to volts with three decimals, e.g. `2.500V`.
    ///
    /// `value` is scaled linearly so that `upper_bound` maps to `reference_volts`. An upper
    /// bound of zero shows `0.000V`.
    fn write_voltage(&mut self, value: u16, upper_bound: u16, reference_volts: u8) -> GpioResult<()> {
        let millivolts = (value as u64 * 1000 * reference_volts as u64)
            .checked_div(upper_bound as u64)
            .unwrap_or(0);
        let fraction = millivolts % 1000;

        write_unsigned(self, millivolts / 1000)?;
        self.write_byte(b'.')?;
        self.write_byte(b'0' + (fraction / 100) as u8)?;
        self.write_byte(b'0' + (fraction / 10 % 10) as u8)?;
        self.write_byte(b'0' + (fraction % 10) as u8)?;
        self.write_byte(b'V')
    }
}

fn write_unsigned<W: LcdWrite + ?Sized>(out: &mut W, number: u64) -> GpioResult<()> {
    let mut divisor = 1;
    while number / divisor >= 10 {
        divisor *= 10;
    }
    while divisor > 0 {
        out.write_byte(b'0' + (number / divisor % 10) as u8)?;
        divisor /= 10;
    }
    Ok(())
}
