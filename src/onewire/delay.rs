//! Blocking delay for hosted backends

use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// `DelayNs` over `std::thread::sleep`
///
/// Sleeps at least as long as requested, which is all the device's
/// compute and programming windows need.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sleeps_at_least_requested() {
        let start = Instant::now();
        StdDelay.delay_ns(1_500_000);
        assert!(start.elapsed() >= Duration::from_micros(1_500));
    }
}
