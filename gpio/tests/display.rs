use charlcd_gpio::delay::NoDelay;
use charlcd_gpio::lcd::hd44780::charmap::CHAR_TABLE;
use charlcd_gpio::lcd::hd44780::{Cursor, Glyph, GlyphBinding, GpioHD44780Driver, Lcd, LcdConfig, LcdWrite, SyncMode};
use charlcd_gpio::sim::{InterfaceState, SimBus, SimEvent, SimLines, SimulatedHd44780};
use proptest::prelude::*;

/// The host side of a simulated display. The controller itself is returned separately so
/// tests can inspect it while the [Lcd] borrows the lines.
struct Rig {
    lines: SimLines,
    bus: SimBus,
}

impl Rig {
    fn new() -> (SimulatedHd44780, Self) {
        Self::starting_in(InterfaceState::EightBit)
    }

    fn starting_in(interface: InterfaceState) -> (SimulatedHd44780, Self) {
        let sim = SimulatedHd44780::with_interface(interface);
        let rig = Rig { lines: sim.lines(), bus: sim.bus() };
        (sim, rig)
    }

    fn lcd(&mut self, config: LcdConfig) -> Lcd<GpioHD44780Driver<'_, NoDelay>> {
        let driver = GpioHD44780Driver::new_4bit(&self.lines.e, Some(&self.lines.rw), &self.lines.rs, &mut self.bus, NoDelay);
        let mut lcd = Lcd::new(driver, config).unwrap();
        lcd.init().unwrap();
        lcd
    }
}

fn bar_cells(sim: &SimulatedHd44780) -> usize {
    sim.row_codes(0).iter().filter(|&&code| code == 0xFF).count()
}

#[test]
fn text_shows_up() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("Hello,\nWorld →").unwrap();

    assert_eq!(sim.row_text(0), "Hello,          ");
    assert_eq!(sim.row_text(1), "World →         ");
}

#[test]
fn starts_from_any_interface_state() {
    for start in [InterfaceState::EightBit, InterfaceState::FourBitHigh, InterfaceState::FourBitLow(0xA)] {
        let (sim, mut rig) = Rig::starting_in(start);
        let mut lcd = rig.lcd(LcdConfig::default());
        lcd.write_str("ok").unwrap();
        drop(lcd);

        assert_eq!(&sim.row_text(0)[..2], "ok", "from {:?}", start);
    }
}

#[test]
fn tilde_and_backslash_use_glyphs() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("~\\").unwrap();

    assert_eq!(sim.cell_bitmap(0, 0), Some(Glyph::TILDE.0));
    assert_eq!(sim.cell_bitmap(0, 1), Some(Glyph::BACKSLASH.0));
}

#[test]
fn page_wraps_and_clears() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345").unwrap();
    assert_eq!(sim.row_text(0), "ABCDEFGHIJKLMNOP");
    assert_eq!(sim.row_text(1), "QRSTUVWXYZ012345");
    assert!(lcd.cursor().is_past_end());

    lcd.write_str("!").unwrap();
    assert_eq!(sim.row_text(0), "!               ");
    assert_eq!(sim.row_text(1), "                ");
}

#[test]
fn clear_and_erase() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("top\nbottom").unwrap();
    lcd.goto(1, 3).unwrap();
    lcd.erase(2).unwrap();
    assert_eq!(lcd.cursor(), Cursor::at(1, 3));
    lcd.write_str("X").unwrap();
    assert_eq!(sim.row_text(0), "toX             ");
    assert_eq!(sim.row_text(1), "                ");

    lcd.clear().unwrap();
    assert_eq!(lcd.cursor(), Cursor::LINE1);
    assert_eq!(sim.row_text(0), "                ");
}

#[test]
fn erase_keeps_cursor_on_either_row() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("top\nbottom").unwrap();
    lcd.goto(2, 5).unwrap();
    lcd.erase(1).unwrap();
    assert_eq!(lcd.cursor(), Cursor::at(2, 5));
    assert_eq!(sim.address(), 0x44);
    assert_eq!(sim.row_text(0), "                ");
    assert_eq!(sim.row_text(1), "bottom          ");

    lcd.erase(2).unwrap();
    assert_eq!(lcd.cursor(), Cursor::at(2, 5));
    assert_eq!(sim.address(), 0x44);
    assert_eq!(sim.row_text(1), "                ");
}

#[test]
fn erase_past_the_end_keeps_pending_clear() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345").unwrap();
    lcd.erase(1).unwrap();
    assert_eq!(lcd.cursor(), Cursor::PAST_END);
    assert_eq!(sim.address(), 0x00);
    assert_eq!(sim.row_text(0), "                ");
    assert_eq!(sim.row_text(1), "QRSTUVWXYZ012345");

    lcd.write_str("!").unwrap();
    assert_eq!(sim.row_text(0), "!               ");
    assert_eq!(sim.row_text(1), "                ");
}

#[test]
fn clear_goes_home_from_anywhere() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("\nrow two").unwrap();
    lcd.goto(2, 9).unwrap();
    lcd.clear().unwrap();
    assert_eq!(lcd.cursor(), Cursor::LINE1);
    assert_eq!(sim.address(), 0x00);
    assert_eq!(sim.row_text(1), "                ");

    lcd.write_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ012345").unwrap();
    assert!(lcd.cursor().is_past_end());
    lcd.clear().unwrap();
    assert_eq!(lcd.cursor(), Cursor::LINE1);
    assert_eq!(sim.address(), 0x00);
    assert_eq!(sim.row_text(0), "                ");
    assert_eq!(sim.row_text(1), "                ");
}

#[test]
fn every_mapped_code_point_shows_once_when_fed_bytewise() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    for &(c, code) in CHAR_TABLE {
        lcd.clear().unwrap();
        sim.clear_log();

        let mut buf = [0; 4];
        for &byte in c.encode_utf8(&mut buf).as_bytes() {
            lcd.write_byte(byte).unwrap();
        }

        let shown: Vec<_> = sim.events().into_iter().filter(|event| matches!(event, SimEvent::Data(_))).collect();
        assert_eq!(shown, vec![SimEvent::Data(code)], "{:?}", c);
        assert_eq!(sim.row_codes(0)[0], code, "{:?}", c);
        assert_eq!(lcd.cursor().position(), 1, "{:?}", c);
    }
}

#[test]
fn controller_address_follows_cursor() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.goto(2, 7).unwrap();
    lcd.back().unwrap();
    lcd.move_by(1, -2).unwrap();
    lcd.home().unwrap();
    lcd.forward().unwrap();
    assert_eq!(sim.address(), lcd.cursor().ddram_address());
    assert_eq!(lcd.cursor().position(), 1);

    lcd.line2().unwrap();
    lcd.write_str("ab").unwrap();
    assert_eq!(sim.address(), 0x42);
}

#[test]
fn numbers() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_hex(0).unwrap();
    lcd.write_byte(b' ').unwrap();
    lcd.write_hex(4095).unwrap();
    lcd.write_byte(b' ').unwrap();
    lcd.write_hex_word(0).unwrap();
    lcd.line2().unwrap();
    lcd.write_dec(0).unwrap();
    lcd.write_byte(b' ').unwrap();
    lcd.write_dec(65535).unwrap();
    lcd.write_byte(b' ').unwrap();
    lcd.write_voltage(512, 1024, 5).unwrap();

    assert_eq!(sim.row_text(0), "0 fff 0000      ");
    assert_eq!(sim.row_text(1), "0 65535 2.500V  ");
}

#[test]
fn hex32_fills_a_row() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_hex32(0x1234_abcd).unwrap();

    assert_eq!(sim.row_text(0), "0x1234abcd      ");
}

#[test]
fn bar_graph() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    lcd.write_str("\nold").unwrap();
    lcd.draw_bar(0).unwrap();
    assert_eq!(bar_cells(&sim), 0);
    assert_eq!(sim.row_text(1), "                ");

    lcd.draw_bar(50).unwrap();
    assert_eq!(bar_cells(&sim), 8);

    lcd.draw_bar(100).unwrap();
    assert_eq!(bar_cells(&sim), 16);
    let full = sim.row_codes(0);

    lcd.draw_bar(150).unwrap();
    assert_eq!(sim.row_codes(0), full);
}

#[test]
fn redefining_a_slot_updates_visible_cells() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    let first = Glyph::from_bits(0x00_04_04_04_04_04_04_04);
    let second = Glyph::from_bits(0x00_00_00_00_1F_00_00_00);
    lcd.register_glyph(3, first).unwrap();
    lcd.write_byte(3).unwrap();
    assert_eq!(sim.cell_bitmap(0, 0), Some(first.0));

    lcd.register_glyph(3, second).unwrap();
    assert_eq!(sim.cell_bitmap(0, 0), Some(second.0));

    // Registration left the address where the cursor is
    lcd.write_str("x").unwrap();
    assert_eq!(sim.row_text(0), "□x              ");
}

#[test]
fn extra_binding() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default().with_glyph(GlyphBinding::SMALL_ROMAN_ELEVEN));

    lcd.write_str("ⅺ").unwrap();

    assert_eq!(sim.cell_bitmap(0, 0), Some(Glyph::SMALL_ROMAN_ELEVEN.0));
}

#[test]
fn busy_polling_display() {
    let (sim, mut rig) = Rig::new();
    sim.set_busy_reads(2);
    let mut lcd = rig.lcd(LcdConfig::default().with_sync_mode(SyncMode::busy_poll()));

    lcd.write_str("polled").unwrap();

    assert_eq!(&sim.row_text(0)[..6], "polled");
    assert!(sim.status_reads() > 0);
}

#[test]
fn stuck_busy_flag_degrades_gracefully() {
    let (sim, mut rig) = Rig::new();
    sim.set_busy_reads(u32::MAX);
    let mut lcd = rig.lcd(LcdConfig::default().with_busy_poll(3));

    assert!(lcd.write_str("still fine").is_ok());
    assert_eq!(&sim.row_text(0)[..10], "still fine");
}

#[test]
fn raw_command() {
    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    // Display off, then back on
    lcd.command(0x08).unwrap();
    assert!(!sim.display_on());
    lcd.command(0x0C).unwrap();
    assert!(sim.display_on());
}

#[test]
fn fmt_write_goes_through_decoder() {
    use std::fmt::Write;

    let (sim, mut rig) = Rig::new();
    let mut lcd = rig.lcd(LcdConfig::default());

    write!(lcd, "{:>5.1}°", 21.3).unwrap();

    assert_eq!(&sim.row_codes(0)[..6], &[b' ', b'2', b'1', b'.', b'3', 0xDF]);
}

proptest! {
    #[test]
    fn split_text_renders_like_whole(text in "[a-z →°αΩä~\\\\]{0,20}", split in 0usize..64) {
        let (whole, mut rig) = Rig::new();
        rig.lcd(LcdConfig::default()).write_str(&text).unwrap();

        let (chunked, mut rig) = Rig::new();
        let mut lcd = rig.lcd(LcdConfig::default());
        let split = split.min(text.len());
        lcd.write_bytes(&text.as_bytes()[..split]).unwrap();
        lcd.write_bytes(&text.as_bytes()[split..]).unwrap();
        drop(lcd);

        prop_assert_eq!(whole.row_codes(0), chunked.row_codes(0));
        prop_assert_eq!(whole.row_codes(1), chunked.row_codes(1));
    }
}
