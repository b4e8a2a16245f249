//! HD44780 character LCD, 2 rows of 16 cells, driven over a 4-bit bus.
//!
//! Two layers:
//!
//! - [driver] knows the instruction set and the bus protocol. [GpioHD44780Driver] bit-bangs
//!   it over GPIO, waiting either fixed execution times or for the busy flag.
//! - [Lcd] turns that into a text display: a cursor that wraps across rows, streaming UTF-8
//!   input mapped onto the character ROM, custom glyphs in the 8 CGRAM slots, and number
//!   formatting through [LcdWrite].
//!
//! ```no_run
//! use charlcd_gpio::delay::StdDelay;
//! use charlcd_gpio::lcd::hd44780::{GpioHD44780Driver, Lcd, LcdConfig, LcdWrite};
//! use charlcd_gpio::raw::{RawGpioDriver, Soc};
//! use charlcd_gpio::GpioDriver;
//!
//! # fn main() -> charlcd_gpio::GpioResult<()> {
//! let gpio = RawGpioDriver::new_gpiomem(Soc::Bcm2837)?;
//! let mut e = gpio.get_pin(17)?;
//! let mut rs = gpio.get_pin(27)?;
//! let mut data = gpio.get_pin_bus([5, 6, 13, 19])?;
//! let e = e.as_output()?;
//! let rs = rs.as_output()?;
//!
//! let driver = GpioHD44780Driver::new_4bit(&*e, None, &*rs, &mut *data, StdDelay);
//! let mut lcd = Lcd::new(driver, LcdConfig::default())?;
//! lcd.init()?;
//! lcd.write_str("Temp: 21")?;
//! lcd.write_str("°C")?;
//! lcd.line2()?;
//! lcd.write_hex32(0xC0FFEE)?;
//! # Ok(())
//! # }
//! ```
pub mod charmap;
pub mod config;
pub mod cursor;
pub mod display;
pub mod driver;
pub mod format;
pub mod glyph;
pub mod utf8;

pub use config::LcdConfig;
pub use cursor::Cursor;
pub use display::Lcd;
pub use driver::{ExecTime, GpioHD44780Driver, HD44780Driver, SyncMode};
pub use format::LcdWrite;
pub use glyph::{Glyph, GlyphBinding, GlyphRegistry};
pub use utf8::Utf8Decoder;
