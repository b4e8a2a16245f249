//! Interrupt masking around timing-critical bus transfers.
//!
//! A byte goes out as two enable pulses, optionally followed by busy-flag polling. If the
//! thread is preempted between the phases of a pulse, the controller may latch a malformed
//! nibble, so the driver masks interrupts for exactly one byte transfer through an
//! [InterruptGuard].
use std::fmt::Debug;

/// Platform hook to mask and unmask interrupts.
///
/// Methods take `&self` so the driver can hold a shared reference next to its pins, the same
/// way it holds the [GpioOutput](crate::GpioOutput) lines.
pub trait InterruptControl: Debug {
    /// Masks interrupts and returns whether they were enabled before the call.
    fn disable(&self) -> bool;

    /// Restores the state returned by a previous [InterruptControl::disable].
    fn restore(&self, was_enabled: bool);
}

/// For hosted targets where a userspace process can't mask interrupts, like Linux on a
/// Raspberry Pi. Transfers still work there since the delays are generous, but a preempted
/// pulse can't be ruled out.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoMasking;

impl InterruptControl for NoMasking {
    fn disable(&self) -> bool {
        false
    }

    fn restore(&self, _was_enabled: bool) {}
}

/// Keeps interrupts masked while alive and puts back the previous state when dropped, no
/// matter how the scope is left (`?` included).
#[derive(Debug)]
pub struct InterruptGuard<'a> {
    control: &'a dyn InterruptControl,
    was_enabled: bool,
}

impl<'a> InterruptGuard<'a> {
    pub fn new(control: &'a dyn InterruptControl) -> Self {
        let was_enabled = control.disable();
        InterruptGuard { control, was_enabled }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.control.restore(self.was_enabled);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Tracks the mask state like a single global interrupt-enable bit.
    #[derive(Debug)]
    pub struct FlagInterrupts {
        pub enabled: Cell<bool>,
        pub disables: Cell<u32>,
    }

    impl FlagInterrupts {
        pub fn new(enabled: bool) -> Self {
            Self { enabled: Cell::new(enabled), disables: Cell::new(0) }
        }
    }

    impl InterruptControl for FlagInterrupts {
        fn disable(&self) -> bool {
            self.disables.set(self.disables.get() + 1);
            self.enabled.replace(false)
        }

        fn restore(&self, was_enabled: bool) {
            self.enabled.set(was_enabled);
        }
    }

    #[test]
    fn guard_masks_and_restores() {
        let irq = FlagInterrupts::new(true);
        {
            let _guard = InterruptGuard::new(&irq);
            assert!(!irq.enabled.get());
        }
        assert!(irq.enabled.get());
    }

    #[test]
    fn nested_guard_keeps_outer_mask() {
        let irq = FlagInterrupts::new(true);
        {
            let _outer = InterruptGuard::new(&irq);
            {
                let _inner = InterruptGuard::new(&irq);
            }
            assert!(!irq.enabled.get(), "inner guard must not unmask");
        }
        assert!(irq.enabled.get());
    }

    #[test]
    fn guard_restores_on_early_return() {
        fn transfer(irq: &FlagInterrupts, fail: bool) -> Result<(), ()> {
            let _guard = InterruptGuard::new(irq);
            if fail {
                return Err(());
            }
            Ok(())
        }

        let irq = FlagInterrupts::new(true);
        assert!(transfer(&irq, true).is_err());
        assert!(irq.enabled.get());
    }

    #[test]
    fn guard_keeps_disabled_state() {
        let irq = FlagInterrupts::new(false);
        drop(InterruptGuard::new(&irq));
        assert!(!irq.enabled.get());
    }
}
