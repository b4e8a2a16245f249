use crate::interrupt::{InterruptControl, InterruptGuard, NoMasking};
use crate::lcd::hd44780::driver::{instruction, timing, CursorDirection, ExecTime, HD44780Driver, SyncMode};
use crate::{GpioBias, GpioBus, GpioBusInput, GpioError, GpioOutput, GpioResult};
use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};
use std::fmt::{Debug, Formatter};

/// Wait after a homing nibble.
#[derive(Copy, Clone, Debug)]
enum HomingWait {
    Millis(u32),
    Micros(u32),
}

/// Nibbles that force the controller into 4-bit mode from any state.
///
/// Before the first nibble the controller is in one of three states:
///
/// | after nibble | a) 8-bit            | b) 4-bit, expects high | c) 4-bit, expects low     |
/// |--------------|---------------------|------------------------|---------------------------|
/// | 1: `0011`    | runs `0011****`     | stores high half       | runs `****0011` (unknown) |
/// | 2: `0011`    | runs `0011****`     | runs `00110011` → 8-bit | stores high half         |
/// | 3: `0011`    | runs `0011****`     | runs `0011****`        | runs `00110011` → 8-bit   |
/// | 4: `0010`    | runs `0010****` → 4-bit in every case                                 |
///
/// The 4.1 ms after the first nibble covers the unknown instruction of case c), which may be
/// a clear or home. The other gaps cover a function set.
const HOMING_SEQUENCE: [(u8, HomingWait); 4] = [
    (0b0011, HomingWait::Millis(timing::HOMING_FIRST_GAP_MS)),
    (0b0011, HomingWait::Micros(timing::HOMING_GAP_US)),
    (0b0011, HomingWait::Micros(timing::HOMING_GAP_US)),
    (0b0010, HomingWait::Micros(42)),
];

/// HD44780 driver bit-banging the 4-bit bus over GPIO pins.
///
/// Only DB4..DB7 are used, DB0..DB3 of the display stay unconnected. Each byte is sent as two
/// enable pulses, high nibble first, with interrupts masked for the whole transfer, including
/// the busy-flag polling in [SyncMode::BusyPoll].
pub struct GpioHD44780Driver<'a, D: DelayNs> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: &'a mut dyn GpioBus<4>,
    interrupts: &'a dyn InterruptControl,
    delay: D,
    sync: SyncMode,
}

impl<'a, D: DelayNs> GpioHD44780Driver<'a, D> {
    /// Creates a driver in [SyncMode::Delay] that doesn't mask interrupts.
    ///
    /// # Parameters
    ///
    /// - `pin_e`: Enable output pin.
    /// - `pin_rw`: Optional read/write output pin. Without it the R/W pin of the display must
    ///   be connected to GND and only [SyncMode::Delay] is available.
    /// - `pin_rs`: Register select output pin.
    /// - `data_bus`: DB4..DB7, in that order.
    /// - `delay`: Source of the microsecond and millisecond waits.
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<4>,
        delay: D,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus,
            interrupts: &NoMasking,
            delay,
            sync: SyncMode::Delay,
        }
    }

    /// Selects how to wait for the controller.
    ///
    /// Busy-flag polling needs the R/W pin and returns [GpioError::InvalidArgument] without
    /// it. The data bus gets pull-ups if the backend supports them.
    pub fn with_sync(mut self, sync: SyncMode) -> GpioResult<Self> {
        self.set_sync_mode(sync)?;
        Ok(self)
    }

    /// Masks interrupts through `interrupts` during each byte transfer.
    pub fn with_interrupts(mut self, interrupts: &'a dyn InterruptControl) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Puts a nibble on DB4..DB7 and pulses E.
    fn send_nibble(&mut self, rs: bool, nibble: u8) -> GpioResult<()> {
        // Set RS pin
        self.pin_rs.write(rs)?;

        // Set RW pin to write, a failed status read may have left it high
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }

        let bus = self.data_bus.as_output()?;
        bus.write_nibble(nibble & 0x0F)?;
        self.delay.delay_us(timing::SETUP_US);

        self.pin_e.write(true)?;
        self.delay.delay_us(timing::PULSE_WIDTH_US);
        self.pin_e.write(false)?;
        self.delay.delay_us(timing::HOLD_US);

        Ok(())
    }

    fn send_byte(&mut self, rs: bool, byte: u8, exec_time: ExecTime) -> GpioResult<()> {
        trace!("Sending byte: {:08b}, RS: {}", byte, rs);

        {
            let _guard = InterruptGuard::new(self.interrupts);
            self.send_nibble(rs, byte >> 4)?;
            self.send_nibble(rs, byte & 0x0F)?;

            if let SyncMode::BusyPoll { max_attempts } = self.sync {
                let (status, attempts) = self.read_status(max_attempts)?;
                if status & instruction::BUSY_FLAG != 0 {
                    warn!("Busy flag still set after {} reads, carrying on", attempts);
                }
            }
        }

        if self.sync == SyncMode::Delay {
            self.delay.delay_us(exec_time.micros());
        }

        Ok(())
    }

    /// One read cycle: raises E, samples the bus while the controller drives it, lowers E.
    fn read_pulse(pin_e: &dyn GpioOutput, input: &(dyn GpioBusInput<4> + '_), delay: &mut D) -> GpioResult<u8> {
        pin_e.write(true)?;
        delay.delay_us(timing::PULSE_WIDTH_US);
        let nibble = input.read_nibble()?;
        pin_e.write(false)?;
        delay.delay_us(timing::HOLD_US);
        Ok(nibble)
    }

    /// Reads the busy flag and address counter until the flag clears or `max_attempts` reads
    /// were made. Returns the last status byte and the number of reads.
    fn read_status(&mut self, max_attempts: u16) -> GpioResult<(u8, u16)> {
        let rw = self.pin_rw.ok_or(GpioError::NotSupported)?;

        // RS low selects the instruction register
        self.pin_rs.write(false)?;

        // Release the bus before R/W goes high, some controllers drive it right away
        let mut status = instruction::BUSY_FLAG;
        let mut attempts = 0;
        {
            let input = self.data_bus.as_input()?;
            rw.write(true)?;
            self.delay.delay_us(timing::SETUP_US);

            while attempts < max_attempts && status & instruction::BUSY_FLAG != 0 {
                attempts += 1;
                let high = Self::read_pulse(self.pin_e, &*input, &mut self.delay)?;
                let low = Self::read_pulse(self.pin_e, &*input, &mut self.delay)?;
                status = (high << 4) | low;
            }

            rw.write(false)?;
        }

        self.data_bus.as_output()?;
        self.delay.delay_us(timing::SETUP_US);

        trace!("Read status: {:08b} after {} attempt(s)", status, attempts);
        Ok((status, attempts))
    }
}

impl<D: DelayNs> Debug for GpioHD44780Driver<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioHD44780Driver")
            .field("pin_e", &self.pin_e)
            .field("pin_rw", &self.pin_rw)
            .field("pin_rs", &self.pin_rs)
            .field("data_bus", &self.data_bus)
            .field("sync", &self.sync)
            .finish()
    }
}

impl<D: DelayNs> HD44780Driver for GpioHD44780Driver<'_, D> {
    fn init(&mut self) -> GpioResult<()> {
        debug!("Initializing HD44780 ({:?})", self.sync);

        // Every line output-low
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }
        self.pin_rs.write(false)?;
        self.pin_e.write(false)?;
        self.data_bus.as_output()?.write_nibble(0)?;

        self.delay.delay_ms(timing::POWER_ON_MS);

        // Homing, timed since the busy flag can't be trusted yet
        for (nibble, wait) in HOMING_SEQUENCE {
            {
                let _guard = InterruptGuard::new(self.interrupts);
                self.send_nibble(false, nibble)?;
            }
            match wait {
                HomingWait::Millis(ms) => self.delay.delay_ms(ms),
                HomingWait::Micros(us) => self.delay.delay_us(us),
            }
        }
        debug!("Controller homed into 4-bit mode");

        self.function_set(false, true, false)?;
        self.set_display_control(false, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.set_display_control(true, false, false)?;

        if let SyncMode::BusyPoll { max_attempts } = self.sync {
            debug!(
                "Busy flag polling gives up after {} reads (at least {:?})",
                max_attempts,
                self.sync.min_poll_timeout(),
            );
        }

        Ok(())
    }

    fn sync_mode(&self) -> SyncMode {
        self.sync
    }

    fn set_sync_mode(&mut self, sync: SyncMode) -> GpioResult<()> {
        if let SyncMode::BusyPoll { .. } = sync {
            if self.pin_rw.is_none() {
                return Err(GpioError::InvalidArgument);
            }
            if self.data_bus.supports_bias() {
                self.data_bus.set_bias(GpioBias::PullUp)?;
            }
        }
        self.sync = sync;
        Ok(())
    }

    fn send_command(&mut self, command: u8, exec_time: ExecTime) -> GpioResult<()> {
        self.send_byte(false, command, exec_time)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send_byte(true, data, ExecTime::Data)
    }

    fn read_busy_flag_and_address(&mut self) -> GpioResult<(bool, u8)> {
        let _guard = InterruptGuard::new(self.interrupts);
        let (status, _) = self.read_status(1)?;
        Ok((status & instruction::BUSY_FLAG != 0, status & !instruction::BUSY_FLAG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::tests::RecordingDelay;
    use crate::delay::NoDelay;
    use crate::interrupt::tests::FlagInterrupts;
    use crate::sim::{InterfaceState, SimBus, SimEvent, SimulatedHd44780};
    use crate::GpioBusOutput;
    use std::io::ErrorKind;

    /// Fails the first read after the bus is released.
    #[derive(Debug)]
    struct FlakyBus {
        inner: SimBus,
        fail_next_read: bool,
    }

    #[derive(Debug)]
    struct FailingInput;

    impl GpioBusInput<4> for FailingInput {
        fn read(&self) -> GpioResult<[bool; 4]> {
            Err(GpioError::Io(ErrorKind::Other))
        }
    }

    impl GpioBus<4> for FlakyBus {
        fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<4> + '_>> {
            if std::mem::take(&mut self.fail_next_read) {
                self.inner.as_input()?;
                return Ok(Box::new(FailingInput));
            }
            self.inner.as_input()
        }

        fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<4> + '_>> {
            self.inner.as_output()
        }

        fn supports_bias(&self) -> bool {
            self.inner.supports_bias()
        }

        fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
            self.inner.set_bias(bias)
        }
    }

    fn homing_nibbles(sim: &SimulatedHd44780) -> Vec<u8> {
        sim.nibbles().iter().take(4).map(|&(_, nibble)| nibble).collect()
    }

    #[test]
    fn init_sends_homing_then_configuration() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        driver.init().unwrap();

        assert_eq!(homing_nibbles(&sim), vec![0b0011, 0b0011, 0b0011, 0b0010]);
        let commands: Vec<_> = sim
            .events()
            .into_iter()
            .filter_map(|event| match event {
                SimEvent::Command(command) => Some(command),
                SimEvent::Data(_) => None,
            })
            .collect();
        // The three homing function sets seen in 8-bit mode, then the configuration
        assert_eq!(commands, vec![0x30, 0x30, 0x30, 0x20, 0x28, 0x08, 0x01, 0x06, 0x0C]);
        assert_eq!(sim.interface(), InterfaceState::FourBitHigh);
        assert!(sim.display_on());
        assert!(sim.two_lines());
    }

    #[test]
    fn homing_converges_from_every_state() {
        for start in [
            InterfaceState::EightBit,
            InterfaceState::FourBitHigh,
            InterfaceState::FourBitLow(0x0),
            InterfaceState::FourBitLow(0x8),
            InterfaceState::FourBitLow(0x3),
        ] {
            let sim = SimulatedHd44780::with_interface(start);
            let lines = sim.lines();
            let mut bus = sim.bus();
            let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

            driver.init().unwrap();

            assert_eq!(sim.interface(), InterfaceState::FourBitHigh, "from {:?}", start);
            assert!(sim.two_lines(), "from {:?}", start);
            assert!(sim.display_on(), "from {:?}", start);
            assert_eq!(sim.address(), 0, "from {:?}", start);
        }
    }

    #[test]
    fn homing_waits_are_not_shortened() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, RecordingDelay::default());

        driver.init().unwrap();

        // Power-on, then per homing nibble three 1 µs phases and the gap
        let calls = &driver.delay.calls;
        assert!(calls[0] >= 15_000_000);
        let gaps: Vec<u64> = calls[1..].chunks(4).take(4).map(|chunk| chunk[3]).collect();
        assert!(gaps[0] >= 4_100_000);
        assert!(gaps[1] >= 100_000);
        assert!(gaps[2] >= 100_000);
        assert!(gaps[3] >= 37_000);
    }

    #[test]
    fn delay_mode_waits_per_instruction() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, RecordingDelay::default());

        driver.clear_display().unwrap();
        assert_eq!(driver.delay.calls.last(), Some(&1_640_000));

        driver.send_data(b'A').unwrap();
        assert_eq!(driver.delay.calls.last(), Some(&46_000));

        driver.set_ddram_address(0x40).unwrap();
        assert_eq!(driver.delay.calls.last(), Some(&42_000));
    }

    #[test]
    fn byte_goes_out_high_nibble_first() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        driver.send_data(0xA5).unwrap();

        assert_eq!(sim.nibbles(), vec![(true, 0xA), (true, 0x5)]);
        assert_eq!(sim.events(), vec![SimEvent::Data(0xA5)]);
    }

    #[test]
    fn busy_poll_requires_rw() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        assert_eq!(driver.with_sync(SyncMode::busy_poll()).err(), Some(GpioError::InvalidArgument));
    }

    #[test]
    fn busy_poll_stops_when_flag_clears() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        sim.set_busy_reads(3);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, RecordingDelay::default())
            .with_sync(SyncMode::BusyPoll { max_attempts: 10 })
            .unwrap();

        driver.send_data(b'x').unwrap();

        // Three busy reads, then the one that sees the flag cleared
        assert_eq!(sim.status_reads(), 4);
        assert!(!sim.bus_is_input());
        assert!(!lines.rw.is_high());
        // No fixed execution delay in poll mode
        assert!(!driver.delay.calls.contains(&46_000));
    }

    #[test]
    fn busy_poll_gives_up_silently() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        sim.set_busy_reads(u32::MAX);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay)
            .with_sync(SyncMode::BusyPoll { max_attempts: 25 })
            .unwrap();

        assert!(driver.send_data(b'x').is_ok());
        assert_eq!(sim.status_reads(), 25);
        assert!(!sim.bus_is_input());
    }

    #[test]
    fn busy_poll_enables_pull_ups() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay)
            .with_sync(SyncMode::busy_poll())
            .unwrap();
        drop(driver);

        assert_eq!(bus.bias(), GpioBias::PullUp);
    }

    #[test]
    fn transfers_mask_interrupts() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        let irq = FlagInterrupts::new(true);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay)
            .with_interrupts(&irq)
            .with_sync(SyncMode::busy_poll())
            .unwrap();

        driver.send_data(b'a').unwrap();
        driver.send_command(0x80, ExecTime::Command).unwrap();

        assert_eq!(irq.disables.get(), 2);
        assert!(irq.enabled.get());
    }

    #[test]
    fn reads_address_counter() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay);

        driver.set_ddram_address(0x45).unwrap();
        assert_eq!(driver.read_busy_flag_and_address().unwrap(), (false, 0x45));

        driver.send_data(b'z').unwrap();
        assert_eq!(driver.read_busy_flag_and_address().unwrap(), (false, 0x46));
    }

    #[test]
    fn reading_without_rw_is_unsupported() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        assert_eq!(driver.read_busy_flag_and_address(), Err(GpioError::NotSupported));
    }

    #[test]
    fn address_range_is_checked() {
        let sim = SimulatedHd44780::new();
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        assert_eq!(driver.set_cgram_address(0x40), Err(GpioError::InvalidArgument));
        assert_eq!(driver.set_ddram_address(0x80), Err(GpioError::InvalidArgument));
    }

    #[test]
    fn failed_status_read_does_not_stick_in_read_mode() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        let lines = sim.lines();
        let mut bus = FlakyBus { inner: sim.bus(), fail_next_read: true };
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, Some(&lines.rw), &lines.rs, &mut bus, NoDelay)
            .with_sync(SyncMode::BusyPoll { max_attempts: 10 })
            .unwrap();

        assert_eq!(driver.send_data(b'A'), Err(GpioError::Io(ErrorKind::Other)));
        assert!(lines.rw.is_high());
        assert!(sim.bus_is_input());

        driver.send_data(b'B').unwrap();
        drop(driver);

        assert!(!lines.rw.is_high());
        assert!(!sim.bus_is_input());
        assert_eq!(sim.events(), vec![SimEvent::Data(b'A'), SimEvent::Data(b'B')]);
        assert_eq!(&sim.row_text(0)[..2], "AB");
    }

    #[test]
    fn instructions_update_controller_state() {
        let sim = SimulatedHd44780::with_interface(InterfaceState::FourBitHigh);
        let lines = sim.lines();
        let mut bus = sim.bus();
        let mut driver = GpioHD44780Driver::new_4bit(&lines.e, None, &lines.rs, &mut bus, NoDelay);

        driver.set_ddram_address(0x05).unwrap();
        driver.cursor_shift(false, CursorDirection::Right).unwrap();
        assert_eq!(sim.address(), 0x06);

        driver.cursor_shift(true, CursorDirection::Left).unwrap();
        driver.cursor_shift(true, CursorDirection::Left).unwrap();
        assert_eq!(sim.display_shift(), -2);

        driver.set_display_control(true, true, true).unwrap();
        assert!(sim.display_on() && sim.cursor_on() && sim.blink_on());
        driver.function_set(false, false, true).unwrap();
        assert!(sim.font_5x10());
        assert!(!sim.two_lines());

        driver.set_entry_mode(CursorDirection::Left, false).unwrap();
        assert!(!sim.increments());
        driver.send_data(b'q').unwrap();
        assert_eq!(sim.ddram(0x06), b'q');
        assert_eq!(sim.address(), 0x05);

        driver.return_home().unwrap();
        assert_eq!(sim.address(), 0x00);
        assert_eq!(sim.display_shift(), 0);
    }
}
