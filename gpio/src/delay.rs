//! Blocking delays for hosted targets.
//!
//! The driver only ever asks for minimum delays, so overshooting is harmless, but sleeping
//! the thread for one microsecond usually costs tens of microseconds on Linux. Short waits
//! spin on the monotonic clock instead.
use embedded_hal::delay::DelayNs;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Copy, Clone)]
pub struct StdDelay;

impl StdDelay {
    /// Waits up to this long are spun, longer ones sleep.
    const SPIN_LIMIT: Duration = Duration::from_micros(100);
}

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        let duration = Duration::from_nanos(ns as u64);
        if duration > Self::SPIN_LIMIT {
            sleep(duration);
            return;
        }

        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            spin_loop();
        }
    }
}

/// Returns immediately. Meant for the [simulated controller](crate::sim), which executes
/// instructions instantly.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
