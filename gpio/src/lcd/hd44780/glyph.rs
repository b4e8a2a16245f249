//! Custom 5x8 glyphs and the CGRAM slots holding them.
use crate::{GpioError, GpioResult};

/// Number of CGRAM slots in 5x8 mode. Slot `n` is shown by character code `n`.
pub const SLOT_COUNT: u8 = 8;

/// A 5x8 bitmap, top row first. Only the 5 low bits of each row are visible.
///
/// The bottom row is where the cursor underline would go. The driver keeps the cursor off,
/// so it's free to use.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Glyph(pub [u8; 8]);

impl Glyph {
    pub const TILDE: Glyph = Glyph([0x00, 0x08, 0x15, 0x02, 0x00, 0x00, 0x00, 0x00]);
    pub const BACKSLASH: Glyph = Glyph([0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00, 0x00]);
    /// Small roman numeral eleven.
    pub const SMALL_ROMAN_ELEVEN: Glyph = Glyph([0x00, 0x01, 0x00, 0x15, 0x09, 0x15, 0x00, 0x00]);

    /// Unpacks 8 rows from a `u64`, the top row in the least significant byte.
    pub const fn from_bits(bits: u64) -> Self {
        Glyph(bits.to_le_bytes())
    }

    pub const fn to_bits(self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    pub fn rows(&self) -> &[u8; 8] {
        &self.0
    }
}

/// A code point drawn by a custom glyph instead of the character ROM.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GlyphBinding {
    pub code_point: char,
    pub slot: u8,
    pub glyph: Glyph,
}

impl GlyphBinding {
    /// The ROM has a yen sign where ASCII has `\`, and a right arrow where it has `~`.
    pub const TILDE: GlyphBinding = GlyphBinding { code_point: '~', slot: 1, glyph: Glyph::TILDE };
    pub const BACKSLASH: GlyphBinding = GlyphBinding { code_point: '\\', slot: 2, glyph: Glyph::BACKSLASH };
    pub const SMALL_ROMAN_ELEVEN: GlyphBinding =
        GlyphBinding { code_point: 'ⅺ', slot: 3, glyph: Glyph::SMALL_ROMAN_ELEVEN };

    pub fn new(code_point: char, slot: u8, glyph: Glyph) -> GpioResult<Self> {
        check_slot(slot)?;
        Ok(GlyphBinding { code_point, slot, glyph })
    }
}

pub(crate) fn check_slot(slot: u8) -> GpioResult<()> {
    if slot >= SLOT_COUNT {
        return Err(GpioError::InvalidArgument);
    }
    Ok(())
}

/// What the driver last wrote to each slot, and which code points map onto slots.
///
/// CGRAM can't be read back over a write-only bus, so this is the only record of it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GlyphRegistry {
    slots: [Option<Glyph>; SLOT_COUNT as usize],
    reservations: Vec<(char, u8)>,
}

impl GlyphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `code_point` to `slot`, replacing an earlier reservation of the same code point.
    pub fn reserve(&mut self, code_point: char, slot: u8) -> GpioResult<()> {
        check_slot(slot)?;
        self.reservations.retain(|&(c, _)| c != code_point);
        self.reservations.push((code_point, slot));
        Ok(())
    }

    pub fn release(&mut self, code_point: char) {
        self.reservations.retain(|&(c, _)| c != code_point);
    }

    /// The slot reserved for `code_point`, if any.
    pub fn code_for(&self, code_point: char) -> Option<u8> {
        self.reservations.iter().find(|&&(c, _)| c == code_point).map(|&(_, slot)| slot)
    }

    pub(crate) fn record(&mut self, slot: u8, glyph: Glyph) -> GpioResult<()> {
        check_slot(slot)?;
        self.slots[slot as usize] = Some(glyph);
        Ok(())
    }

    /// The glyph last written to `slot`, `None` if it was never written in this session.
    pub fn glyph(&self, slot: u8) -> Option<Glyph> {
        self.slots.get(slot as usize).copied().flatten()
    }
}
