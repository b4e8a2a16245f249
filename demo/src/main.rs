mod config;
mod showcase;

use crate::config::DemoConfig;
use crate::showcase::Showcase;
use charlcd_gpio::delay::{NoDelay, StdDelay};
use charlcd_gpio::lcd::hd44780::{GlyphBinding, GpioHD44780Driver, HD44780Driver, Lcd, LcdConfig};
use charlcd_gpio::raw::RawGpioDriver;
use charlcd_gpio::sim::SimulatedHd44780;
use charlcd_gpio::GpioDriver;
use dotenv::dotenv;
use log::{debug, info};

fn lcd_config(config: &DemoConfig) -> LcdConfig {
    LcdConfig::default()
        .with_sync_mode(config.sync)
        .with_glyph(GlyphBinding::SMALL_ROMAN_ELEVEN)
        .with_error_stream(true)
}

fn run<D: HD44780Driver>(lcd: &mut Lcd<D>, speed: f32, on_frame: impl FnMut()) -> eyre::Result<()> {
    lcd.init()?;
    debug!("{:?} initialized.", lcd);

    let result = Showcase { speed, on_frame }.run(lcd);
    if let Err(err) = &result {
        lcd.clear()?;
        lcd.write_error_str("Error:\n")?;
        lcd.write_error_str(&err.to_string())?;
    }
    result
}

fn run_on_pi(config: &DemoConfig) -> eyre::Result<()> {
    debug!("Initializing GPIO driver...");
    let gpio = RawGpioDriver::new_gpiomem(config.soc)?;
    debug!("{:?} initialized.", gpio);

    let mut pin_e = gpio.get_pin(config.pin_e)?;
    let pin_e_out = pin_e.as_output()?;
    let mut pin_rs = gpio.get_pin(config.pin_rs)?;
    let pin_rs_out = pin_rs.as_output()?;
    let mut pin_rw = config.pin_rw.map(|index| gpio.get_pin(index)).transpose()?;
    let pin_rw_out = pin_rw.as_mut().map(|pin| pin.as_output()).transpose()?;
    let mut data_bus = gpio.get_pin_bus(config.pins_data)?;

    let driver = GpioHD44780Driver::new_4bit(
        &*pin_e_out,
        pin_rw_out.as_deref(),
        &*pin_rs_out,
        &mut *data_bus,
        StdDelay,
    );
    let mut lcd = Lcd::new(driver, lcd_config(config))?;

    run(&mut lcd, 1.0, || {})
}

fn run_simulated(config: &DemoConfig) -> eyre::Result<()> {
    let sim = SimulatedHd44780::new();
    let lines = sim.lines();
    let mut bus = sim.bus();

    let driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay);
    let mut lcd = Lcd::new(driver, lcd_config(config))?;

    let mut last = (String::new(), String::new());
    run(&mut lcd, 0.0, || {
        let screen = (sim.row_text(0), sim.row_text(1));
        if screen != last {
            info!("┌────────────────┐");
            info!("│{}│", screen.0);
            info!("│{}│", screen.1);
            info!("└────────────────┘");
            last = screen;
        }
    })
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("charlcd demo starting...");

    let config = DemoConfig::from_env()?;
    if config.simulate {
        info!("LCD simulated, {:?}", config.sync);
        run_simulated(&config)
    } else {
        info!(
            "LCD @ E: {}, RW: {:?}, RS: {}, Data: {:?} on {:?}, {:?}",
            config.pin_e, config.pin_rw, config.pin_rs, config.pins_data, config.soc, config.sync,
        );
        run_on_pi(&config)
    }
}
