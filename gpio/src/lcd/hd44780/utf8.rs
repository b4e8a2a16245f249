//! Streaming UTF-8 decoding, one byte at a time.
//!
//! Text may reach the display in arbitrary chunks, so a code point split across two writes
//! must still come out as one character. The decoder never fails: anything it can't decode
//! becomes [char::REPLACEMENT_CHARACTER] and the buffer starts over.

/// Buffers the bytes of at most one code point.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Utf8Decoder {
    buf: [u8; 4],
    len: usize,
}

/// Sequence length announced by a leading byte, `None` for a continuation byte or a byte
/// that can't start a sequence.
fn sequence_length(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting for the rest of their sequence.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Feeds one byte. Returns the decoded character once a sequence is complete, `None`
    /// while more bytes are needed.
    ///
    /// A byte that can't start a sequence decodes to the replacement character right away.
    /// Continuation bytes are only checked once the announced length is reached, so a
    /// broken sequence costs exactly that many bytes.
    pub fn push(&mut self, byte: u8) -> Option<char> {
        self.buf[self.len] = byte;
        self.len += 1;

        let Some(needed) = sequence_length(self.buf[0]) else {
            self.len = 0;
            return Some(char::REPLACEMENT_CHARACTER);
        };
        if self.len < needed {
            return None;
        }

        let bytes = &self.buf[..needed];
        self.len = 0;

        if !bytes[1..].iter().all(|&b| is_continuation(b)) {
            return Some(char::REPLACEMENT_CHARACTER);
        }

        let payload_bits = [0x7F, 0x1F, 0x0F, 0x07][needed - 1];
        let code_point = bytes[1..]
            .iter()
            .fold((bytes[0] & payload_bits) as u32, |acc, &b| (acc << 6) | (b & 0x3F) as u32);

        let shortest_form_min = [0, 0x80, 0x800, 0x1_0000][needed - 1];
        if code_point < shortest_form_min {
            return Some(char::REPLACEMENT_CHARACTER);
        }

        // Surrogates and anything above U+10FFFF
        Some(char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}
