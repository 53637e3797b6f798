use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

/// Monotonic time source plus blocking waits.
///
/// Every wait in a round (sample gap, warm-up, inter-shot delay, poll
/// cadence) goes through the `DelayNs` half so a simulated clock can stand
/// in for the real one.
pub trait Clock: DelayNs {
    fn now(&self) -> Instant;

    /// Block for `duration`, saturating at `u32::MAX` milliseconds.
    fn sleep(&mut self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        self.delay_ms(ms);
    }
}

/// `std::time::Instant` and `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
