// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! The permanence gate, the backpressure restart timeout, checkpoint
//! scheduling and the rate limiter all work on deadlines. Routing them
//! through a clock trait lets tests drive time forward without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that provides the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// A deadline `interval` from now.
    fn deadline(&self, interval: Duration) -> Instant {
        self.now() + interval
    }
}

/// Real system clock
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn fake_clock_advances_only_on_demand() {
        let clock = FakeClock::new();
        let a = clock.now();
        assert_eq!(clock.now(), a);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), a + Duration::from_secs(5));
    }

    #[test]
    fn deadline_is_relative_to_now() {
        let clock = FakeClock::new();
        let d = clock.deadline(Duration::from_millis(100));
        assert_eq!(d, clock.now() + Duration::from_millis(100));

        clock.advance(Duration::from_millis(100));
        assert!(clock.now() >= d);
    }
}
