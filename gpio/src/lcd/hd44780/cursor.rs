//! Where the next character lands on a 2x16 display.
//!
//! Positions 0..=15 are row 1, 16..=31 are row 2, and 32 means the cursor ran past the end
//! of row 2: the next character write clears the display and starts over at position 0.
//! The controller's own address counter can't express that, so the driver keeps this model
//! and re-issues the DDRAM address after every move.

/// Cursor position in `0..=32`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Cursor(u8);

impl Cursor {
    pub const COLUMNS: u8 = 16;
    pub const ROWS: u8 = 2;

    /// Start of row 1.
    pub const LINE1: Cursor = Cursor(0);
    /// Start of row 2.
    pub const LINE2: Cursor = Cursor(Self::COLUMNS);
    /// Past the last cell, a pending clear.
    pub const PAST_END: Cursor = Cursor(Self::COLUMNS * Self::ROWS);

    /// Wraps a raw position, `None` if it's above 32.
    pub fn new(position: u8) -> Option<Self> {
        (position <= Self::PAST_END.0).then_some(Cursor(position))
    }

    /// Cursor at a 1-based row and column, clamped onto the display.
    pub fn at(row: u8, col: u8) -> Self {
        let row = row.clamp(1, Self::ROWS) - 1;
        let col = col.clamp(1, Self::COLUMNS) - 1;
        Cursor(row * Self::COLUMNS + col)
    }

    pub fn position(self) -> u8 {
        self.0
    }

    pub fn is_past_end(self) -> bool {
        self == Self::PAST_END
    }

    /// 0-based row. The past-the-end position counts as row 0, where it resumes.
    pub fn row(self) -> u8 {
        (self.0 / Self::COLUMNS) % Self::ROWS
    }

    /// 0-based column. The past-the-end position counts as column 0.
    pub fn col(self) -> u8 {
        self.0 % Self::COLUMNS
    }

    /// DDRAM address of the cell, `0x00 + col` on row 1 and `0x40 + col` on row 2.
    pub fn ddram_address(self) -> u8 {
        self.row() * 0x40 + self.col()
    }

    /// One cell right, wrapping from the end of row 1 to row 2 and from the end of row 2
    /// (or past it) to the start of row 1.
    pub fn forward(self) -> Self {
        if self.0 >= Self::PAST_END.0 - 1 {
            Self::LINE1
        } else {
            Cursor(self.0 + 1)
        }
    }

    /// One cell left, wrapping from the start of row 1 to the end of row 2.
    pub fn back(self) -> Self {
        match self.0 {
            0 => Cursor(Self::PAST_END.0 - 1),
            position => Cursor(position - 1),
        }
    }

    /// Start of the current row.
    pub fn home(self) -> Self {
        Cursor(self.row() * Self::COLUMNS)
    }

    /// Moves by whole rows and columns. Rows wrap modulo 2 and columns modulo 16 without
    /// carrying into the row.
    pub fn moved_by(self, drow: i16, dcol: i16) -> Self {
        let row = (self.row() as i32 + drow as i32).rem_euclid(Self::ROWS as i32) as u8;
        let col = (self.col() as i32 + dcol as i32).rem_euclid(Self::COLUMNS as i32) as u8;
        Cursor(row * Self::COLUMNS + col)
    }

    /// Position after a character was written. Stops at the past-the-end position.
    pub fn advanced(self) -> Self {
        Cursor((self.0 + 1).min(Self::PAST_END.0))
    }

    /// Position after a line break: row 2 from row 1, past the end from row 2.
    pub fn newline(self) -> Self {
        if self.0 < Self::COLUMNS {
            Self::LINE2
        } else {
            Self::PAST_END
        }
    }
}
