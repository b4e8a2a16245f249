//! Code points the A00 character ROM can show, and the codes it shows them under.
//!
//! Lookup order: the [table](CHAR_TABLE) first, first match wins, then everything up to
//! U+0080 passes through as its own code, and the rest becomes [PLACEHOLDER]. Custom glyph
//! reservations take precedence over all of this, see [GlyphRegistry](super::GlyphRegistry).

/// Shown for anything unmapped, a full 5x8 block.
pub const PLACEHOLDER: u8 = 0xFF;

/// Code point to ROM code. Some ROM cells are reachable from more than one code point.
///
/// U+009D, U+00DA and U+00D9 are where code page 437 keeps ¥, ┌ and ┘, and some senders
/// still emit those.
pub const CHAR_TABLE: &[(char, u8)] = &[
    ('\u{9D}', 0x5C),
    ('¥', 0x5C),
    ('→', 0x7E),
    ('←', 0x7F),
    ('ₒ', 0xA1),
    ('\u{DA}', 0xA2),
    ('┌', 0xA2),
    ('\u{D9}', 0xA3),
    ('┘', 0xA3),
    ('·', 0xA5),
    ('∃', 0xAE),
    ('Ǝ', 0xAE),
    ('▯', 0xDB),
    ('□', 0xDB),
    ('°', 0xDF),
    ('α', 0xE0),
    ('ä', 0xE1),
    ('β', 0xE2),
    ('ß', 0xE2),
    ('ε', 0xE3),
    ('Ɛ', 0xE3),
    ('μ', 0xE4),
    ('µ', 0xE4),
    ('σ', 0xE5),
    ('ρ', 0xE6),
    ('√', 0xE8),
    ('⅟', 0xE9),
    ('¢', 0xEC),
    ('ñ', 0xEE),
    ('ö', 0xEF),
    ('θ', 0xF2),
    ('∞', 0xF3),
    ('Ω', 0xF4),
    ('ü', 0xF5),
    ('Σ', 0xF6),
    ('π', 0xF7),
    ('÷', 0xFD),
    ('▮', 0xFF),
    ('■', 0xFF),
];

/// ROM code for `c`, ignoring custom glyphs. Never fails.
pub fn rom_code(c: char) -> u8 {
    if let Some(&(_, code)) = CHAR_TABLE.iter().find(|&&(mapped, _)| mapped == c) {
        return code;
    }
    match u8::try_from(c as u32) {
        Ok(code) if code <= 0x80 => code,
        _ => PLACEHOLDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_identity() {
        for c in ' '..='}' {
            assert_eq!(rom_code(c), c as u8);
        }
        assert_eq!(rom_code('\u{80}'), 0x80);
    }

    #[test]
    fn table_entries() {
        assert_eq!(rom_code('→'), 0x7E);
        assert_eq!(rom_code('°'), 0xDF);
        assert_eq!(rom_code('µ'), 0xE4);
        assert_eq!(rom_code('μ'), 0xE4);
        assert_eq!(rom_code('\u{9D}'), 0x5C);
        assert_eq!(rom_code('▮'), 0xFF);
    }

    #[test]
    fn unmapped_falls_back() {
        assert_eq!(rom_code('é'), PLACEHOLDER);
        assert_eq!(rom_code('\u{81}'), PLACEHOLDER);
        assert_eq!(rom_code(char::REPLACEMENT_CHARACTER), PLACEHOLDER);
        assert_eq!(rom_code('😀'), PLACEHOLDER);
    }

    #[test]
    fn table_has_no_duplicate_keys() {
        for (i, (c, _)) in CHAR_TABLE.iter().enumerate() {
            assert!(CHAR_TABLE[i + 1..].iter().all(|(other, _)| other != c), "{c:?} listed twice");
        }
    }
}
