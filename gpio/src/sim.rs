//! A software HD44780 behind the GPIO traits.
//!
//! [SimulatedHd44780] watches the lines the driver toggles, latches nibbles on the falling
//! edge of E the way the controller does, and executes the decoded instructions against its
//! own DDRAM and CGRAM. It answers busy-flag reads, can be told to stay busy for a number of
//! reads, and can start out in any interface state to exercise the homing sequence.
//!
//! Everything runs instantly, so pair it with [NoDelay](crate::delay::NoDelay).
//!
//! Reading DDRAM or CGRAM back over the bus isn't modelled. A read with RS high returns the
//! same status nibbles as one with RS low.
use crate::lcd::hd44780::driver::instruction::*;
use crate::{GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioOutput, GpioResult};
use log::trace;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Which half of the bus protocol the controller expects next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InterfaceState {
    /// Every nibble is taken as the upper half of a full instruction, the lower half reading
    /// as zero since DB0..DB3 aren't connected. The state after power-on.
    EightBit,
    /// 4-bit mode, waiting for the high nibble.
    FourBitHigh,
    /// 4-bit mode, holding the high nibble and waiting for the low one.
    FourBitLow(u8),
}

/// A byte the controller executed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    Command(u8),
    Data(u8),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Line {
    E,
    Rs,
    Rw,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AddressSpace {
    Ddram,
    Cgram,
}

const DDRAM_SIZE: usize = 0x80;
const CGRAM_SIZE: usize = 0x40;
const LINE_LENGTH: u8 = 0x28;
const SECOND_LINE: u8 = 0x40;

#[derive(Debug)]
struct SimState {
    interface: InterfaceState,

    e: bool,
    rs: bool,
    rw: bool,
    bus_input: bool,
    host_nibble: u8,
    bias: GpioBias,
    read_low_next: bool,

    ddram: [u8; DDRAM_SIZE],
    cgram: [u8; CGRAM_SIZE],
    address: u8,
    space: AddressSpace,
    increment: bool,
    entry_shift: bool,
    display_shift: i16,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    eight_bit: bool,
    two_lines: bool,
    font_5x10: bool,

    busy_reads: u32,
    busy_remaining: u32,
    status_reads: u32,

    nibbles: Vec<(bool, u8)>,
    events: Vec<SimEvent>,
}

impl SimState {
    fn new(interface: InterfaceState) -> Self {
        SimState {
            interface,
            e: false,
            rs: false,
            rw: false,
            bus_input: false,
            host_nibble: 0,
            bias: GpioBias::None,
            read_low_next: false,
            ddram: [b' '; DDRAM_SIZE],
            cgram: [0; CGRAM_SIZE],
            address: 0,
            space: AddressSpace::Ddram,
            increment: true,
            entry_shift: false,
            display_shift: 0,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            eight_bit: interface == InterfaceState::EightBit,
            two_lines: false,
            font_5x10: false,
            busy_reads: 0,
            busy_remaining: 0,
            status_reads: 0,
            nibbles: Vec::new(),
            events: Vec::new(),
        }
    }

    fn set_line(&mut self, line: Line, value: bool) {
        match line {
            Line::E => {
                let falling = self.e && !value;
                self.e = value;
                if falling {
                    self.e_falling();
                }
            }
            Line::Rs => self.rs = value,
            Line::Rw => self.rw = value,
        }
    }

    fn e_falling(&mut self) {
        if self.rw {
            // The low half completes a status read
            if self.read_low_next && self.busy_remaining > 0 && self.busy_remaining != u32::MAX {
                self.busy_remaining -= 1;
            }
            if self.read_low_next {
                self.status_reads += 1;
            }
            self.read_low_next = !self.read_low_next;
            return;
        }

        if self.bus_input {
            trace!("E pulsed with the bus released, nothing latched");
            return;
        }

        let nibble = self.host_nibble & 0x0F;
        self.nibbles.push((self.rs, nibble));
        self.read_low_next = false;

        match self.interface {
            InterfaceState::EightBit => self.execute(self.rs, nibble << 4),
            InterfaceState::FourBitHigh => self.interface = InterfaceState::FourBitLow(nibble),
            InterfaceState::FourBitLow(high) => {
                self.interface = InterfaceState::FourBitHigh;
                self.execute(self.rs, (high << 4) | nibble);
            }
        }
    }

    fn status(&self) -> u8 {
        let busy = if self.busy_remaining > 0 { BUSY_FLAG } else { 0 };
        busy | (self.address & 0x7F)
    }

    fn bus_level(&self) -> u8 {
        if self.rw && self.e {
            let status = self.status();
            return if self.read_low_next { status & 0x0F } else { status >> 4 };
        }
        if !self.bus_input {
            return self.host_nibble & 0x0F;
        }
        match self.bias {
            GpioBias::PullUp => 0x0F,
            _ => 0x00,
        }
    }

    fn advance(&mut self, forward: bool) {
        self.address = match self.space {
            AddressSpace::Cgram => {
                let next = if forward { self.address.wrapping_add(1) } else { self.address.wrapping_sub(1) };
                next & 0x3F
            }
            AddressSpace::Ddram => step_ddram(self.address, forward),
        };
    }

    fn execute(&mut self, rs: bool, byte: u8) {
        self.busy_remaining = self.busy_reads;

        if rs {
            trace!("Simulated controller: data {:#04x} at {:#04x}", byte, self.address);
            self.events.push(SimEvent::Data(byte));
            match self.space {
                AddressSpace::Ddram => self.ddram[self.address as usize & 0x7F] = byte,
                AddressSpace::Cgram => self.cgram[self.address as usize & 0x3F] = byte,
            }
            if self.entry_shift && self.space == AddressSpace::Ddram {
                self.display_shift += if self.increment { -1 } else { 1 };
            }
            self.advance(self.increment);
            return;
        }

        trace!("Simulated controller: command {:#010b}", byte);
        self.events.push(SimEvent::Command(byte));

        if byte & SET_DDRAM_ADDRESS != 0 {
            self.space = AddressSpace::Ddram;
            self.address = byte & 0x7F;
        } else if byte & SET_CGRAM_ADDRESS != 0 {
            self.space = AddressSpace::Cgram;
            self.address = byte & 0x3F;
        } else if byte & FUNCTION_SET != 0 {
            self.eight_bit = byte & DATA_LENGTH_8BIT != 0;
            self.two_lines = byte & TWO_LINES != 0;
            self.font_5x10 = byte & FONT_5X10 != 0;
            if self.eight_bit {
                self.interface = InterfaceState::EightBit;
            } else if self.interface == InterfaceState::EightBit {
                self.interface = InterfaceState::FourBitHigh;
            }
        } else if byte & CURSOR_SHIFT != 0 {
            let right = byte & SHIFT_RIGHT != 0;
            if byte & SHIFT_DISPLAY != 0 {
                self.display_shift += if right { 1 } else { -1 };
            } else {
                self.space = AddressSpace::Ddram;
                self.address = step_ddram(self.address, right);
            }
        } else if byte & DISPLAY_CONTROL != 0 {
            self.display_on = byte & DISPLAY_ON != 0;
            self.cursor_on = byte & CURSOR_ON != 0;
            self.blink_on = byte & BLINK_ON != 0;
        } else if byte & ENTRY_MODE_SET != 0 {
            self.increment = byte & ENTRY_INCREMENT != 0;
            self.entry_shift = byte & ENTRY_SHIFT != 0;
        } else if byte & RETURN_HOME != 0 {
            self.space = AddressSpace::Ddram;
            self.address = 0;
            self.display_shift = 0;
        } else if byte & CLEAR_DISPLAY != 0 {
            self.ddram = [b' '; DDRAM_SIZE];
            self.space = AddressSpace::Ddram;
            self.address = 0;
            self.display_shift = 0;
            self.increment = true;
        }
    }
}

/// Next DDRAM address in 2-line mode, where line 1 spans 0x00..=0x27 and line 2 spans
/// 0x40..=0x67.
fn step_ddram(address: u8, forward: bool) -> u8 {
    let line = address & SECOND_LINE;
    let offset = (address & 0x3F).min(LINE_LENGTH - 1);
    match (forward, offset) {
        (true, o) if o == LINE_LENGTH - 1 => line ^ SECOND_LINE,
        (true, o) => line | (o + 1),
        (false, 0) => (line ^ SECOND_LINE) | (LINE_LENGTH - 1),
        (false, o) => line | (o - 1),
    }
}

/// Renders a character code the way the A00 character ROM shows it.
///
/// Codes 0x00..=0x0F address CGRAM and render as `□`. Codes without a close Unicode
/// counterpart render as U+FFFD.
pub fn render_code(code: u8) -> char {
    match code {
        0x00..=0x0F => '□',
        b'\\' => '¥',
        0x7E => '→',
        0x7F => '←',
        0x20..=0x7D => code as char,
        0xA2 => '「',
        0xA3 => '」',
        0xDF => '°',
        0xE4 => 'µ',
        0xFF => '█',
        _ => char::REPLACEMENT_CHARACTER,
    }
}

/// A simulated 2x16 HD44780 module.
///
/// Clones share the same controller. Hand [SimulatedHd44780::lines] and
/// [SimulatedHd44780::bus] to the driver and inspect the result through the other methods.
#[derive(Clone)]
pub struct SimulatedHd44780 {
    state: Rc<RefCell<SimState>>,
}

/// The control lines of a [SimulatedHd44780].
#[derive(Debug)]
pub struct SimLines {
    pub e: SimPin,
    pub rs: SimPin,
    pub rw: SimPin,
}

impl SimulatedHd44780 {
    /// A freshly powered controller: 8-bit interface, blank display, display off.
    pub fn new() -> Self {
        Self::with_interface(InterfaceState::EightBit)
    }

    /// A controller left in any interface state, e.g. by an interrupted earlier session.
    pub fn with_interface(interface: InterfaceState) -> Self {
        SimulatedHd44780 { state: Rc::new(RefCell::new(SimState::new(interface))) }
    }

    pub fn lines(&self) -> SimLines {
        SimLines {
            e: SimPin { line: Line::E, state: self.state.clone() },
            rs: SimPin { line: Line::Rs, state: self.state.clone() },
            rw: SimPin { line: Line::Rw, state: self.state.clone() },
        }
    }

    /// The DB4..DB7 lines.
    pub fn bus(&self) -> SimBus {
        SimBus { state: self.state.clone() }
    }

    /// Keeps the busy flag set for the next `reads` status reads after every instruction.
    /// [u32::MAX] keeps it set forever.
    pub fn set_busy_reads(&self, reads: u32) {
        let mut state = self.state.borrow_mut();
        state.busy_reads = reads;
        if reads == u32::MAX {
            state.busy_remaining = reads;
        }
    }

    pub fn interface(&self) -> InterfaceState {
        self.state.borrow().interface
    }

    /// Current address counter, in DDRAM or CGRAM depending on the last address set.
    pub fn address(&self) -> u8 {
        self.state.borrow().address
    }

    pub fn display_on(&self) -> bool {
        self.state.borrow().display_on
    }

    pub fn cursor_on(&self) -> bool {
        self.state.borrow().cursor_on
    }

    pub fn blink_on(&self) -> bool {
        self.state.borrow().blink_on
    }

    pub fn two_lines(&self) -> bool {
        self.state.borrow().two_lines
    }

    pub fn font_5x10(&self) -> bool {
        self.state.borrow().font_5x10
    }

    pub fn increments(&self) -> bool {
        self.state.borrow().increment
    }

    pub fn display_shift(&self) -> i16 {
        self.state.borrow().display_shift
    }

    pub fn ddram(&self, address: u8) -> u8 {
        self.state.borrow().ddram[address as usize & 0x7F]
    }

    /// The 8 rows of a CGRAM slot, top row first.
    pub fn cgram_glyph(&self, slot: u8) -> [u8; 8] {
        let state = self.state.borrow();
        let start = (slot as usize & 0x07) * 8;
        let mut rows = [0; 8];
        rows.copy_from_slice(&state.cgram[start..start + 8]);
        rows
    }

    /// Character codes of the 16 visible cells of `row` (0 or 1).
    pub fn row_codes(&self, row: usize) -> [u8; 16] {
        let state = self.state.borrow();
        let start = if row == 0 { 0 } else { SECOND_LINE as usize };
        let mut codes = [0; 16];
        codes.copy_from_slice(&state.ddram[start..start + 16]);
        codes
    }

    /// The visible cells of `row` as text, see [render_code].
    pub fn row_text(&self, row: usize) -> String {
        self.row_codes(row).into_iter().map(render_code).collect()
    }

    /// The bitmap a cell shows if it holds a CGRAM code. Follows later redefinitions of the
    /// slot, like the real display.
    pub fn cell_bitmap(&self, row: usize, col: usize) -> Option<[u8; 8]> {
        let code = *self.row_codes(row).get(col)?;
        (code < 0x10).then(|| self.cgram_glyph(code))
    }

    /// Every byte executed so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    /// Every nibble latched so far with its RS level.
    pub fn nibbles(&self) -> Vec<(bool, u8)> {
        self.state.borrow().nibbles.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.nibbles.clear();
    }

    /// Number of complete status reads, i.e. pairs of read pulses.
    pub fn status_reads(&self) -> u32 {
        self.state.borrow().status_reads
    }

    /// Whether the host currently has the data lines set as inputs.
    pub fn bus_is_input(&self) -> bool {
        self.state.borrow().bus_input
    }
}

impl Default for SimulatedHd44780 {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimulatedHd44780 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimulatedHd44780")
            .field("interface", &state.interface)
            .field("address", &state.address)
            .field("display_on", &state.display_on)
            .field("two_lines", &state.two_lines)
            .finish()
    }
}

/// A control line of a [SimulatedHd44780].
pub struct SimPin {
    line: Line,
    state: Rc<RefCell<SimState>>,
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        let state = self.state.borrow();
        match self.line {
            Line::E => state.e,
            Line::Rs => state.rs,
            Line::Rw => state.rw,
        }
    }
}

impl Debug for SimPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimPin({:?})", self.line)
    }
}

impl GpioOutput for SimPin {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.state.borrow_mut().set_line(self.line, value);
        Ok(())
    }
}

/// The DB4..DB7 lines of a [SimulatedHd44780]. Supports pull-up and pull-down bias.
pub struct SimBus {
    state: Rc<RefCell<SimState>>,
}

impl Debug for SimBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimBus")
    }
}

impl GpioBus<4> for SimBus {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<4> + '_>> {
        self.state.borrow_mut().bus_input = true;
        Ok(Box::new(SimBusHandle { state: self.state.clone() }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<4> + '_>> {
        self.state.borrow_mut().bus_input = false;
        Ok(Box::new(SimBusHandle { state: self.state.clone() }))
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.state.borrow().bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.state.borrow_mut().bias = bias;
        Ok(())
    }
}

struct SimBusHandle {
    state: Rc<RefCell<SimState>>,
}

impl Debug for SimBusHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimBusHandle")
    }
}

impl GpioBusInput<4> for SimBusHandle {
    fn read(&self) -> GpioResult<[bool; 4]> {
        let level = self.state.borrow().bus_level();
        Ok(std::array::from_fn(|i| level & (1 << i) != 0))
    }
}

impl GpioBusOutput<4> for SimBusHandle {
    fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
        let nibble = values
            .iter()
            .enumerate()
            .fold(0u8, |nibble, (i, &high)| if high { nibble | 1 << i } else { nibble });
        self.state.borrow_mut().host_nibble = nibble;
        Ok(())
    }
}
