//! Low-level HD44780 driver interface: the instruction set, its execution times, and the
//! two ways of waiting for the controller.
//!
//! See [HD44780Driver] for the commands and [GpioHD44780Driver] for the 4-bit GPIO transport.
//!
//! # Sources
//!
//! - Hitachi, [“HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,”](https://cdn-shop.adafruit.com/datasheets/HD44780.pdf)
//!   ADE-207-272(Z), 1999.
mod gpio;

use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::Debug;
use std::time::Duration;

/// Worst-case execution time of an instruction at the slowest oscillator frequency the
/// datasheet allows. Used for waiting in [SyncMode::Delay].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecTime {
    /// Every instruction except clear and home: 37 µs nominal.
    Command,
    /// Writing data to CGRAM or DDRAM: 37 µs plus 4 µs address update.
    Data,
    /// Clear display and return home: 1.52 ms nominal.
    Slow,
}

impl ExecTime {
    pub fn micros(self) -> u32 {
        match self {
            ExecTime::Command => 42,
            ExecTime::Data => 46,
            ExecTime::Slow => 1640,
        }
    }
}

/// How the driver waits for the controller after each byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncMode {
    /// Sleep for the [ExecTime] of the instruction. Works with R/W tied to ground.
    Delay,
    /// Read the busy flag until it clears, giving up after `max_attempts` reads. Needs the
    /// R/W line.
    ///
    /// Running out of attempts is treated like a cleared flag. A controller that stays busy
    /// will therefore garble the display instead of stalling the program.
    BusyPoll { max_attempts: u16 },
}

impl SyncMode {
    /// A budget of roughly 8 ms, well above the slowest instruction.
    pub const DEFAULT_BUSY_ATTEMPTS: u16 = 2000;

    /// Busy-flag polling with [SyncMode::DEFAULT_BUSY_ATTEMPTS].
    pub fn busy_poll() -> Self {
        SyncMode::BusyPoll { max_attempts: Self::DEFAULT_BUSY_ATTEMPTS }
    }

    /// Lower bound of the time spent polling before giving up.
    ///
    /// Each attempt is two enable pulses with [timing::PULSE_WIDTH_US] high and
    /// [timing::HOLD_US] low each. The real figure is larger by the time the GPIO backend
    /// needs per pin access, which this crate can't know.
    pub fn min_poll_timeout(self) -> Duration {
        match self {
            SyncMode::Delay => Duration::ZERO,
            SyncMode::BusyPoll { max_attempts } => {
                let per_attempt = 2 * (timing::PULSE_WIDTH_US + timing::HOLD_US);
                Duration::from_micros(max_attempts as u64 * per_attempt as u64)
            }
        }
    }
}

/// Timing of the bus and of the power-on homing sequence.
///
/// The enable cycle minimums are in the hundreds of nanoseconds, and the values here round
/// them up to whole microseconds. The homing gaps are exact datasheet bounds: the sequence
/// converges only if every possibly pending instruction has finished before the next nibble.
pub mod timing {
    /// Address setup before raising E (min. 40 ns, 60 ns when reading).
    pub const SETUP_US: u32 = 1;
    /// E high (min. 230 ns).
    pub const PULSE_WIDTH_US: u32 = 1;
    /// E low before the next pulse (hold min. 10 ns, full cycle min. 500 ns).
    pub const HOLD_US: u32 = 1;
    /// Internal reset after Vcc rises above 4.5 V.
    pub const POWER_ON_MS: u32 = 15;
    /// After the first homing nibble (min. 4.1 ms).
    pub const HOMING_FIRST_GAP_MS: u32 = 5;
    /// After the second and third homing nibbles (min. 100 µs).
    pub const HOMING_GAP_US: u32 = 100;
}

/// Instruction opcodes and their flag bits.
pub mod instruction {
    pub const CLEAR_DISPLAY: u8 = 0b0000_0001;
    pub const RETURN_HOME: u8 = 0b0000_0010;

    pub const ENTRY_MODE_SET: u8 = 0b0000_0100;
    pub const ENTRY_INCREMENT: u8 = 0b0000_0010;
    pub const ENTRY_SHIFT: u8 = 0b0000_0001;

    pub const DISPLAY_CONTROL: u8 = 0b0000_1000;
    pub const DISPLAY_ON: u8 = 0b0000_0100;
    pub const CURSOR_ON: u8 = 0b0000_0010;
    pub const BLINK_ON: u8 = 0b0000_0001;

    pub const CURSOR_SHIFT: u8 = 0b0001_0000;
    pub const SHIFT_DISPLAY: u8 = 0b0000_1000;
    pub const SHIFT_RIGHT: u8 = 0b0000_0100;

    pub const FUNCTION_SET: u8 = 0b0010_0000;
    pub const DATA_LENGTH_8BIT: u8 = 0b0001_0000;
    pub const TWO_LINES: u8 = 0b0000_1000;
    pub const FONT_5X10: u8 = 0b0000_0100;

    pub const SET_CGRAM_ADDRESS: u8 = 0b0100_0000;
    pub const SET_DDRAM_ADDRESS: u8 = 0b1000_0000;

    pub const BUSY_FLAG: u8 = 0b1000_0000;
}

use instruction::*;

/// Direction the address counter moves after a data write.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// Commands of the HD44780 instruction set on top of two transport primitives.
///
/// Implementations only provide [HD44780Driver::init], [HD44780Driver::send_command],
/// [HD44780Driver::send_data] and [HD44780Driver::read_busy_flag_and_address]. Everything
/// else is expressed through those and tagged with its [ExecTime].
pub trait HD44780Driver: Debug {
    /// Brings the controller from an unknown state into 4-bit, 2-line, 5x8 mode with a
    /// cleared, visible display, no cursor and left-to-right entry.
    fn init(&mut self) -> GpioResult<()>;

    fn sync_mode(&self) -> SyncMode {
        SyncMode::Delay
    }

    /// Switches the synchronization strategy.
    ///
    /// Returns [GpioError::InvalidArgument] if the wiring can't support `sync`, and
    /// [GpioError::NotSupported] if the transport has a fixed strategy.
    fn set_sync_mode(&mut self, _sync: SyncMode) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Clears the display and sets the address counter to 0.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CLEAR_DISPLAY, ExecTime::Slow)
    }

    /// Sets the address counter to 0 and undoes any display shift.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(RETURN_HOME, ExecTime::Slow)
    }

    /// Sets the cursor direction after writes and whether the display shifts along.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = ENTRY_MODE_SET;
        if cursor_direction == CursorDirection::Right {
            command |= ENTRY_INCREMENT;
        }
        if shift {
            command |= ENTRY_SHIFT;
        }
        self.send_command(command, ExecTime::Command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = DISPLAY_CONTROL;
        if display_on {
            command |= DISPLAY_ON;
        }
        if cursor_on {
            command |= CURSOR_ON;
        }
        if blink_on {
            command |= BLINK_ON;
        }
        self.send_command(command, ExecTime::Command)
    }

    /// Moves the cursor or shifts the display without touching DDRAM.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = CURSOR_SHIFT;
        if display_shift {
            command |= SHIFT_DISPLAY;
        }
        if direction == CursorDirection::Right {
            command |= SHIFT_RIGHT;
        }
        self.send_command(command, ExecTime::Command)
    }

    /// Sets interface data length, number of lines and font.
    fn function_set(&mut self, data_length_8bit: bool, two_lines: bool, font_5x10: bool) -> GpioResult<()> {
        let mut command = FUNCTION_SET;
        if data_length_8bit {
            command |= DATA_LENGTH_8BIT;
        }
        if two_lines {
            command |= TWO_LINES;
        }
        if font_5x10 {
            command |= FONT_5X10;
        }
        self.send_command(command, ExecTime::Command)
    }

    /// Points the address counter into CGRAM. Following data writes define glyph rows.
    ///
    /// The address is 6 bits wide, anything larger returns [GpioError::InvalidArgument].
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b0011_1111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(SET_CGRAM_ADDRESS | address, ExecTime::Command)
    }

    /// Points the address counter into DDRAM, i.e. moves the cursor.
    ///
    /// The address is 7 bits wide, anything larger returns [GpioError::InvalidArgument].
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b0111_1111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(SET_DDRAM_ADDRESS | address, ExecTime::Command)
    }

    /// Sends a raw instruction (RS low) and waits `exec_time` or for the busy flag.
    fn send_command(&mut self, command: u8, exec_time: ExecTime) -> GpioResult<()>;

    /// Sends a byte to CGRAM or DDRAM (RS high), whichever the address counter points into.
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Reads the busy flag and the address counter.
    ///
    /// Returns [GpioError::NotSupported] if the R/W line isn't wired.
    fn read_busy_flag_and_address(&mut self) -> GpioResult<(bool, u8)>;
}
