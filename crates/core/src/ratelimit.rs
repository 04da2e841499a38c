// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimum-interval gate for repeated warnings
//!
//! Repeated conditions (ring overflow, consistency warnings) must not
//! flood the log; callers gate each message through a per-condition
//! limiter. Default interval is one message per 5 seconds.

use crate::clock::Clock;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

pub struct RateLimit {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimit {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Returns true when the caller may emit; records the emission time.
    pub fn check(&self, clock: &dyn Clock) -> bool {
        let now = clock.now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(t) if now.duration_since(t) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}
