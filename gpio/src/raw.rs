//! Raspberry Pi GPIO backend that maps the GPIO register block into the process.
//!
//! Going through the registers directly keeps a pin toggle in the order of tens of
//! nanoseconds, which the HD44780 timing (1 µs per enable phase) needs. Character-device
//! based backends are an order of magnitude slower per access.
use crate::{GpioBias, GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioError, GpioInput, GpioOutput, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

/// SoC family, which decides where the GPIO block lives in physical memory and how
/// pull resistors are configured.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Soc {
    /// Pi 1, Zero.
    Bcm2835,
    /// Pi 2, Pi 3.
    Bcm2837,
    /// Pi 4, Pi 400.
    Bcm2711,
}

impl Soc {
    fn gpio_base(self) -> u64 {
        match self {
            Soc::Bcm2835 => 0x2020_0000,
            Soc::Bcm2837 => 0x3F20_0000,
            Soc::Bcm2711 => 0xFE20_0000,
        }
    }

    /// Only the BCM2711 has the `GPIO_PUP_PDN_CNTRL` registers. The older chips need the
    /// clocked `GPPUD` sequence, which isn't implemented.
    fn has_pull_control(self) -> bool {
        self == Soc::Bcm2711
    }
}

mod reg {
    pub const GPFSEL0: usize = 0x00;
    pub const GPSET0: usize = 0x1c;
    pub const GPCLR0: usize = 0x28;
    pub const GPLEV0: usize = 0x34;
    pub const GPIO_PUP_PDN_CNTRL_REG0: usize = 0xe4;
}

const FUNCTION_INPUT: u32 = 0b000;
const FUNCTION_OUTPUT: u32 = 0b001;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    soc: Soc,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const PIN_COUNT: usize = 54;

    fn create(path: &str, offset: u64, soc: Soc) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(4096)
            .map_raw(&file)?;

        debug!("Mapped GPIO registers of {:?} from {} at offset {:#x}", soc, path, offset);

        Ok(RawGpioDriver {
            mmap,
            soc,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the registers through `/dev/gpiomem`, which exposes only the GPIO block and
    /// doesn't need root.
    pub fn new_gpiomem(soc: Soc) -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0, soc)
    }

    /// Maps the registers through `/dev/mem` at the physical address of the GPIO block.
    pub fn new_mem(soc: Soc) -> GpioResult<Self> {
        Self::create("/dev/mem", soc.gpio_base(), soc)
    }

    fn register(&self, offset: usize) -> *mut u32 {
        let base = self.mmap.as_mut_ptr() as *mut u32;
        // SAFETY: every offset used below is inside the 4 KiB GPIO block that was mapped.
        unsafe { base.add(offset / 4) }
    }

    fn check_pin(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    pub(crate) fn set_function(&self, pin_index: usize, function: u32) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        // GPFSELn holds ten pins, three bits each
        let register = self.register(reg::GPFSEL0 + (pin_index / 10) * 4);
        let shift = (pin_index % 10) * 3;

        unsafe {
            let mut value = register.read_volatile();
            value &= !(0b111 << shift);
            value |= function << shift;
            register.write_volatile(value);
        }
        Ok(())
    }

    pub(crate) fn set_level(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        Self::check_pin(pin_index)?;

        let bank = if high { reg::GPSET0 } else { reg::GPCLR0 };
        let register = self.register(bank + (pin_index / 32) * 4);
        unsafe { register.write_volatile(1 << (pin_index % 32)) };
        Ok(())
    }

    pub(crate) fn level(&self, pin_index: usize) -> GpioResult<bool> {
        Self::check_pin(pin_index)?;

        let register = self.register(reg::GPLEV0 + (pin_index / 32) * 4);
        let value = unsafe { register.read_volatile() };
        Ok((value >> (pin_index % 32)) & 1 != 0)
    }

    pub(crate) fn set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        Self::check_pin(pin_index)?;
        if !self.soc.has_pull_control() {
            return Err(GpioError::NotSupported);
        }

        let bits = match bias {
            GpioBias::None => 0b00,
            GpioBias::PullUp => 0b01,
            GpioBias::PullDown => 0b10,
        };

        let register = self.register(reg::GPIO_PUP_PDN_CNTRL_REG0 + (pin_index / 16) * 4);
        let shift = (pin_index % 16) * 2;
        unsafe {
            let mut value = register.read_volatile();
            value &= !(0b11 << shift);
            value |= bits << shift;
            register.write_volatile(value);
        }
        Ok(())
    }

    pub(crate) fn bias(&self, pin_index: usize) -> GpioResult<GpioBias> {
        Self::check_pin(pin_index)?;
        if !self.soc.has_pull_control() {
            return Ok(GpioBias::None);
        }

        let register = self.register(reg::GPIO_PUP_PDN_CNTRL_REG0 + (pin_index / 16) * 4);
        let shift = (pin_index % 16) * 2;
        let value = unsafe { register.read_volatile() };

        match (value >> shift) & 0b11 {
            0b00 => Ok(GpioBias::None),
            0b01 => Ok(GpioBias::PullUp),
            0b10 => Ok(GpioBias::PullDown),
            _ => Err(GpioError::NotSupported),
        }
    }

    /// Puts a freshly claimed pin into a known state: input, low latch.
    fn reset(&self, pin_index: usize) -> GpioResult<()> {
        self.set_function(pin_index, FUNCTION_INPUT)?;
        self.set_level(pin_index, false)?;
        Ok(())
    }

    fn claim(&self, index: usize) -> GpioResult<()> {
        Self::check_pin(index)?;
        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }
        self.used_pins.set_aliased(index, true);
        self.reset(index)
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?}@{:?})", self.soc, self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        self.claim(index)?;

        Ok(Box::new(RawGpioPin {
            driver: self,
            pin_index: index,
        }))
    }

    fn get_pin_bus<const N: usize>(&self, indices: [usize; N]) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        if indices.iter().any(|&index| index >= Self::PIN_COUNT) {
            return Err(GpioError::InvalidArgument);
        }
        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for &index in &indices {
            self.claim(index)?;
        }

        Ok(Box::new(RawGpioBus {
            driver: self,
            pin_indices: indices,
        }))
    }
}

struct RawGpioPin<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
}

impl Debug for RawGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        self.driver.set_function(self.pin_index, FUNCTION_INPUT)?;
        Ok(Box::new(RawGpioInput { pin: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.driver.set_function(self.pin_index, FUNCTION_OUTPUT)?;
        Ok(Box::new(RawGpioOutput { pin: self }))
    }

    fn supports_bias(&self) -> bool {
        self.driver.soc.has_pull_control()
    }

    fn bias(&self) -> GpioBias {
        self.driver.bias(self.pin_index).unwrap_or(GpioBias::None)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.driver.set_bias(self.pin_index, bias)
    }
}

impl Drop for RawGpioPin<'_> {
    fn drop(&mut self) {
        _ = self.driver.set_function(self.pin_index, FUNCTION_INPUT);
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct RawGpioInput<'a> {
    pin: &'a RawGpioPin<'a>,
}

impl Debug for RawGpioInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for RawGpioInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        self.pin.driver.level(self.pin.pin_index)
    }
}

struct RawGpioOutput<'a> {
    pin: &'a RawGpioPin<'a>,
}

impl Debug for RawGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for RawGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin.driver.set_level(self.pin.pin_index, value)
    }
}

struct RawGpioBus<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
}

impl<const N: usize> Debug for RawGpioBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for RawGpioBus<'_, N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        for &pin_index in &self.pin_indices {
            self.driver.set_function(pin_index, FUNCTION_INPUT)?;
        }
        Ok(Box::new(RawGpioBusInput { bus: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        for &pin_index in &self.pin_indices {
            self.driver.set_function(pin_index, FUNCTION_OUTPUT)?;
        }
        Ok(Box::new(RawGpioBusOutput { bus: self }))
    }

    fn supports_bias(&self) -> bool {
        self.driver.soc.has_pull_control()
    }

    fn bias(&self) -> GpioBias {
        self.driver.bias(self.pin_indices[0]).unwrap_or(GpioBias::None)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        for &pin_index in &self.pin_indices {
            self.driver.set_bias(pin_index, bias)?;
        }
        Ok(())
    }
}

impl<const N: usize> Drop for RawGpioBus<'_, N> {
    fn drop(&mut self) {
        for &pin_index in &self.pin_indices {
            _ = self.driver.set_function(pin_index, FUNCTION_INPUT);
            self.driver.used_pins.set_aliased(pin_index, false);
        }
    }
}

struct RawGpioBusInput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.bus)
    }
}

impl<const N: usize> GpioBusInput<N> for RawGpioBusInput<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let mut values = [false; N];
        for (value, &pin_index) in values.iter_mut().zip(&self.bus.pin_indices) {
            *value = self.bus.driver.level(pin_index)?;
        }
        Ok(values)
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&value, &pin_index) in values.iter().zip(&self.bus.pin_indices) {
            self.bus.driver.set_level(pin_index, value)?;
        }
        Ok(())
    }
}
