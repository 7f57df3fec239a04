/*
 * Copyright (C) 2026 the udpsweep contributors
 *
 * This file is part of udpsweep.
 *
 * udpsweep is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * udpsweep is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with udpsweep.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::time::{Duration, Instant};

/// the timebase the harness measures against: a free-running microsecond
/// counter plus a microsecond-granularity sleep
pub trait Clock: Send + Sync {
    /// microseconds since an arbitrary fixed origin
    fn now_us(&self) -> u64;

    fn sleep_us(&self, us: u64);
}

/// production timebase over [`std::time::Instant`]; the origin is the moment
/// of construction, so readings start near zero
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep_us(&self, us: u64) {
        if us > 0 {
            std::thread::sleep(Duration::from_micros(us));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::ManualClock;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let first = clock.now_us();
        clock.sleep_us(1_000);
        let second = clock.now_us();
        assert!(second >= first + 1_000);
    }

    #[test]
    fn test_manual_clock_is_scriptable() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_us(), 100);
        clock.advance(50);
        assert_eq!(clock.now_us(), 150);
        clock.set(10);
        assert_eq!(clock.now_us(), 10);
    }
}
