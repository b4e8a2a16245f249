//! The board test: every feature of the display once, with pauses to look at it.
use charlcd_gpio::lcd::hd44780::{Glyph, HD44780Driver, Lcd, LcdWrite};
use log::info;
use std::fmt::Write;
use std::thread::sleep;
use std::time::Duration;

/// A line sweeping around its center, one frame per 45°.
const SPINNER: [Glyph; 8] = [
    Glyph([0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0]),
    Glyph([0b01000, 0b01000, 0b00100, 0b00100, 0b00100, 0b00010, 0b00010, 0]),
    Glyph([0b10000, 0b10000, 0b01000, 0b00100, 0b00010, 0b00001, 0b00001, 0]),
    Glyph([0b00000, 0b00000, 0b11000, 0b00100, 0b00011, 0b00000, 0b00000, 0]),
    Glyph([0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000, 0]),
    Glyph([0b00000, 0b00000, 0b00011, 0b00100, 0b11000, 0b00000, 0b00000, 0]),
    Glyph([0b00001, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b10000, 0]),
    Glyph([0b00010, 0b00010, 0b00100, 0b00100, 0b00100, 0b01000, 0b01000, 0]),
];

const SPINNER_SLOT: u8 = 7;

pub struct Showcase<F: FnMut()> {
    /// Scales every pause, 0 runs through without waiting.
    pub speed: f32,
    /// Called whenever there's something new on the screen.
    pub on_frame: F,
}

impl<F: FnMut()> Showcase<F> {
    fn pause(&mut self, millis: u64) {
        (self.on_frame)();
        if self.speed > 0.0 {
            sleep(Duration::from_millis(millis).div_f32(self.speed));
        }
    }

    pub fn run<D: HD44780Driver>(&mut self, lcd: &mut Lcd<D>) -> eyre::Result<()> {
        info!("Greeting");
        lcd.write_str("Hello world!")?;
        self.pause(2000);

        info!("Bar graph");
        for percent in 0..=100 {
            lcd.draw_bar(percent)?;
            lcd.line2()?;
            write!(lcd, "{}%", percent)?;
            self.pause(100);
        }
        self.pause(2000);

        info!("Special characters");
        for text in [
            "Tilde: ~\nBackslash: \\",
            "Left Arrow: ←\nRight Arrow: →",
            "Umlaut: äöü\nGreek: αβεμσρθπ",
            "Misc: ÷√⅟°∃□¢∞",
        ] {
            lcd.clear()?;
            lcd.write_str(text)?;
            self.pause(1000);
        }
        self.pause(1000);

        info!("Animation");
        lcd.clear()?;
        lcd.write_str("Animation:")?;
        lcd.line2()?;
        lcd.write_byte(SPINNER_SLOT)?;
        for i in 0..20 {
            lcd.register_glyph(SPINNER_SLOT, SPINNER[i % SPINNER.len()])?;
            self.pause(250);
        }
        self.pause(2000);

        info!("Line and page break");
        lcd.clear()?;
        for c in ('a'..='z').cycle().take(104) {
            lcd.write_char(c)?;
            self.pause(100);
        }
        self.pause(2000);

        info!("Numbers");
        self.counters(lcd, 8..15, |lcd, n| lcd.write_hex_nibble(n as u8))?;
        self.counters(lcd, 125..132, |lcd, n| lcd.write_hex_byte(n as u8))?;
        self.counters(lcd, 4093..4100, |lcd, n| lcd.write_hex_word(n))?;
        self.counters(lcd, 4093..4100, |lcd, n| lcd.write_hex(n))?;
        self.pause(2000);

        lcd.clear()?;
        lcd.write_hex32(0x00C0_FFEE)?;
        lcd.line2()?;
        lcd.write_str("ADC: ")?;
        lcd.write_voltage(4093, 4095, 5)?;
        self.pause(2000);

        info!("Finished");
        lcd.clear()?;
        lcd.write_str("  ~ Finished ~  ")?;
        self.pause(0);

        Ok(())
    }

    /// Counts through `range`, hex on row 1 and decimal on row 2.
    fn counters<D: HD44780Driver>(
        &mut self,
        lcd: &mut Lcd<D>,
        range: std::ops::Range<u16>,
        write_hex: impl Fn(&mut Lcd<D>, u16) -> charlcd_gpio::GpioResult<()>,
    ) -> eyre::Result<()> {
        lcd.clear()?;
        lcd.write_str("Hex:")?;
        lcd.line2()?;
        lcd.write_str("Dec:")?;
        for n in range {
            lcd.goto(1, 6)?;
            write_hex(lcd, n)?;
            lcd.goto(2, 6)?;
            lcd.write_dec(n)?;
            self.pause(500);
        }
        Ok(())
    }
}
