use charlcd_gpio::lcd::hd44780::SyncMode;
use charlcd_gpio::raw::Soc;
use dotenv::var;

/// Display wiring and options, read from the environment.
#[derive(Debug)]
pub struct DemoConfig {
    pub pin_e: usize,
    pub pin_rs: usize,
    pub pin_rw: Option<usize>,
    pub pins_data: [usize; 4],
    pub soc: Soc,
    pub sync: SyncMode,
    pub simulate: bool,
}

fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre::eyre!("Invalid number of data pins"))
}

fn parse_soc(soc_str: &str) -> eyre::Result<Soc> {
    match soc_str.trim().to_ascii_lowercase().as_str() {
        "bcm2835" => Ok(Soc::Bcm2835),
        "bcm2836" | "bcm2837" => Ok(Soc::Bcm2837),
        "bcm2711" => Ok(Soc::Bcm2711),
        other => Err(eyre::eyre!("Unknown SoC {:?}", other)),
    }
}

fn is_set(name: &str) -> bool {
    var(name).is_ok_and(|value| !matches!(value.trim(), "" | "0" | "false"))
}

impl DemoConfig {
    pub fn from_env() -> eyre::Result<Self> {
        let simulate = is_set("CHARLCD_SIMULATE");

        let pin_rw = var("CHARLCD_PIN_RW").ok().map(|s| s.trim().parse()).transpose()?;
        let sync = match var("CHARLCD_BUSY_ATTEMPTS").ok() {
            Some(attempts) => SyncMode::BusyPoll { max_attempts: attempts.trim().parse()? },
            None => SyncMode::Delay,
        };

        if simulate {
            // The simulator has all lines, wiring is irrelevant
            return Ok(DemoConfig {
                pin_e: 0,
                pin_rs: 0,
                pin_rw: Some(0),
                pins_data: [0; 4],
                soc: Soc::Bcm2837,
                sync,
                simulate,
            });
        }

        Ok(DemoConfig {
            pin_e: var("CHARLCD_PIN_E")?.trim().parse()?,
            pin_rs: var("CHARLCD_PIN_RS")?.trim().parse()?,
            pin_rw,
            pins_data: parse_pin_bus(&var("CHARLCD_PINS_DATA")?)?,
            soc: var("CHARLCD_SOC").map_or(Ok(Soc::Bcm2837), |soc| parse_soc(&soc))?,
            sync,
            simulate,
        })
    }
}
