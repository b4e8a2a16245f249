use crate::lcd::hd44780::driver::SyncMode;
use crate::lcd::hd44780::glyph::GlyphBinding;
use crate::GpioResult;

/// Settings applied by [Lcd::init](super::Lcd::init).
///
/// ```
/// use charlcd_gpio::lcd::hd44780::{Glyph, GlyphBinding, LcdConfig, SyncMode};
///
/// let config = LcdConfig::default()
///     .with_sync_mode(SyncMode::busy_poll())
///     .with_glyph(GlyphBinding::new('♥', 4, Glyph([0, 10, 31, 31, 14, 4, 0, 0]))?)
///     .with_error_stream(true);
/// # Ok::<(), charlcd_gpio::GpioError>(())
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LcdConfig {
    /// Strategy handed to the driver before init. `None` keeps the driver's own.
    pub sync: Option<SyncMode>,
    /// Glyphs written to CGRAM at init, in order. A later binding for the same slot wins.
    pub glyphs: Vec<GlyphBinding>,
    /// Whether [Lcd::write_error_str](super::Lcd::write_error_str) reaches the display.
    pub error_stream: bool,
}

impl Default for LcdConfig {
    /// Tilde in slot 1, backslash in slot 2, driver's sync mode, error stream unbound.
    fn default() -> Self {
        LcdConfig {
            sync: None,
            glyphs: vec![GlyphBinding::TILDE, GlyphBinding::BACKSLASH],
            error_stream: false,
        }
    }
}

impl LcdConfig {
    pub fn with_sync_mode(mut self, sync: SyncMode) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Busy-flag polling giving up after `max_attempts` reads.
    pub fn with_busy_poll(self, max_attempts: u16) -> Self {
        self.with_sync_mode(SyncMode::BusyPoll { max_attempts })
    }

    pub fn with_glyph(mut self, binding: GlyphBinding) -> Self {
        self.glyphs.push(binding);
        self
    }

    /// Drops the tilde and backslash bindings, freeing slots 1 and 2. `~` and `\` then show
    /// the ROM's arrow and yen sign.
    pub fn without_default_glyphs(mut self) -> Self {
        self.glyphs
            .retain(|binding| *binding != GlyphBinding::TILDE && *binding != GlyphBinding::BACKSLASH);
        self
    }

    pub fn with_error_stream(mut self, bound: bool) -> Self {
        self.error_stream = bound;
        self
    }

    /// Checks every binding, see [GlyphBinding::new].
    pub fn validate(&self) -> GpioResult<()> {
        self.glyphs
            .iter()
            .try_for_each(|binding| crate::lcd::hd44780::glyph::check_slot(binding.slot))
    }
}
