// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lsid watermark set
//!
//! An lsid is a monotonic u64 identifying a position in the log stream in
//! physical blocks. A device maintains seven watermarks, updated as a
//! single set under one lock:
//!
//! - `latest`: next lsid to assign; advances on pack finalization
//! - `flush`: lsid up to which an LDEV flush has been requested
//! - `completed`: lsid up to which log writes have completed
//! - `permanent`: lsid up to which log writes are durable
//! - `written`: lsid up to which data-device writes have completed
//! - `prev_written`: `written` at the previous checkpoint
//! - `oldest`: lsid of the oldest retained logpack
//!
//! Invariant: `oldest <= written <= permanent <= completed <= latest` and
//! `flush <= latest`. Each watermark is non-decreasing.

/// Reserved lsid value meaning "not assigned".
pub const INVALID_LSID: u64 = u64::MAX;

/// The seven lsid watermarks of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lsids {
    pub latest: u64,
    pub flush: u64,
    pub completed: u64,
    pub permanent: u64,
    pub written: u64,
    pub prev_written: u64,
    pub oldest: u64,
}

impl Lsids {
    /// All watermarks at `lsid`, the state of a freshly opened device.
    pub fn new(lsid: u64) -> Self {
        Self {
            latest: lsid,
            flush: lsid,
            completed: lsid,
            permanent: lsid,
            written: lsid,
            prev_written: lsid,
            oldest: lsid,
        }
    }

    /// Check the ordering invariant.
    pub fn is_valid(&self) -> bool {
        self.oldest <= self.written
            && self.written <= self.permanent
            && self.permanent <= self.completed
            && self.completed <= self.latest
            && self.flush <= self.latest
    }

    /// Whether no durable log exists beyond `oldest`.
    ///
    /// The `lsids` notification edge fires when this transitions from
    /// true to false.
    pub fn is_permanent_log_empty(&self) -> bool {
        self.permanent == self.oldest
    }

    /// Log usage in physical blocks: `latest - oldest`.
    pub fn log_usage(&self) -> u64 {
        self.latest - self.oldest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_valid_and_empty() {
        let lsids = Lsids::new(100);
        assert!(lsids.is_valid());
        assert!(lsids.is_permanent_log_empty());
        assert_eq!(lsids.log_usage(), 0);
    }

    #[test]
    fn ordering_violation_is_invalid() {
        let mut lsids = Lsids::new(10);
        lsids.written = 9;
        assert!(!lsids.is_valid());

        let mut lsids = Lsids::new(10);
        lsids.permanent = 11;
        assert!(!lsids.is_valid());
    }

    #[test]
    fn permanent_past_oldest_is_not_empty() {
        let mut lsids = Lsids::new(0);
        lsids.latest = 8;
        lsids.completed = 8;
        lsids.permanent = 8;
        assert!(lsids.is_valid());
        assert!(!lsids.is_permanent_log_empty());
        assert_eq!(lsids.log_usage(), 8);
    }
}
