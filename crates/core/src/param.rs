// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device creation parameters and process-wide tunables

use crate::block::LOGICAL_BLOCK_SIZE;
use crate::error::ParamError;
use crate::superblock::DEVICE_NAME_MAX;
use std::path::PathBuf;
use std::time::Duration;

const SECTORS_PER_MB: u64 = (1 << 20) / LOGICAL_BLOCK_SIZE as u64;

/// Per-device creation options.
#[derive(Clone, Debug)]
pub struct DeviceParams {
    pub name: String,
    /// Maximum logpack payload in KiB; 0 means unlimited.
    pub max_logpack_kb: u32,
    /// Freeze submission when pending data exceeds this.
    pub max_pending_mb: u32,
    /// Unfreeze when pending data falls below this.
    pub min_pending_mb: u32,
    /// Unfreeze unconditionally after this long.
    pub queue_stop_timeout_ms: u32,
    /// Size trigger for flush headers; must be at most half of
    /// `max_pending_mb`.
    pub log_flush_interval_mb: u32,
    /// Period trigger for flush headers; 0 disables forced flushes and
    /// relaxes the consistency contract (bench/test only).
    pub log_flush_interval_ms: u32,
    /// GC batch size in packs.
    pub n_pack_bulk: usize,
    /// Stage batch size in I/Os.
    pub n_io_bulk: usize,
    /// Interval of the superblock checkpoint.
    pub checkpoint_interval_ms: u64,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_logpack_kb: 0,
            max_pending_mb: 32,
            min_pending_mb: 16,
            queue_stop_timeout_ms: 100,
            log_flush_interval_mb: 16,
            log_flush_interval_ms: 100,
            n_pack_bulk: 128,
            n_io_bulk: 1024,
            checkpoint_interval_ms: 10_000,
        }
    }
}

impl DeviceParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.name.len() >= DEVICE_NAME_MAX {
            return Err(ParamError::NameTooLong(self.name.len()));
        }
        if self.name.as_bytes().contains(&0) {
            return Err(ParamError::NameContainsNul);
        }
        if self.max_pending_mb == 0 {
            return Err(ParamError::ZeroMaxPending);
        }
        if self.min_pending_mb == 0 {
            return Err(ParamError::ZeroMinPending);
        }
        if self.min_pending_mb > self.max_pending_mb {
            return Err(ParamError::PendingRangeInverted {
                min: self.min_pending_mb,
                max: self.max_pending_mb,
            });
        }
        if self.log_flush_interval_mb * 2 > self.max_pending_mb {
            return Err(ParamError::FlushIntervalTooLarge {
                flush: self.log_flush_interval_mb,
                max: self.max_pending_mb,
            });
        }
        Ok(())
    }

    pub fn max_pending_sectors(&self) -> u64 {
        u64::from(self.max_pending_mb) * SECTORS_PER_MB
    }

    pub fn min_pending_sectors(&self) -> u64 {
        u64::from(self.min_pending_mb) * SECTORS_PER_MB
    }

    pub fn queue_stop_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.queue_stop_timeout_ms))
    }

    /// Maximum logpack payload in physical blocks; 0 means unlimited.
    pub fn max_logpack_pb(&self, pbs: u32) -> u32 {
        if self.max_logpack_kb == 0 {
            0
        } else {
            self.max_logpack_kb.saturating_mul(1024) / pbs
        }
    }

    /// Size trigger of the flush header in physical blocks.
    pub fn log_flush_interval_pb(&self, pbs: u32) -> u64 {
        u64::from(self.log_flush_interval_mb) * (1 << 20) / u64::from(pbs)
    }

    pub fn log_flush_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.log_flush_interval_ms))
    }
}

/// What to do with a discard when the data device has no discard support.
///
/// The original driver silently elides such discards; `LogOnly` instead
/// records a metadata-only no-op for replay fidelity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiscardPolicy {
    #[default]
    Elide,
    LogOnly,
}

/// Process-wide tunables.
#[derive(Clone, Debug)]
pub struct Tunables {
    /// May skip fsync of the superblock during checkpoint (for test).
    pub is_sync_superblock: bool,
    /// Insertion-sort data writes by position before submission.
    pub is_sort_data_io: bool,
    /// Executable invoked as `exec_path minor_id event` on device events.
    pub exec_path_on_error: Option<PathBuf>,
    /// Fail writes that would overflow the ring instead of overwriting
    /// the oldest log entries.
    pub is_error_before_overflow: bool,
    pub discard_policy: DiscardPolicy,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            is_sync_superblock: true,
            is_sort_data_io: true,
            exec_path_on_error: None,
            is_error_before_overflow: false,
            discard_policy: DiscardPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn defaults_validate() {
        assert!(DeviceParams::default().validate().is_ok());
    }

    #[parameterized(
        zero_max_pending = { 0, 16, 8 },
        zero_min_pending = { 32, 0, 8 },
        inverted_range = { 16, 32, 8 },
        flush_interval_over_half = { 32, 16, 17 },
    )]
    fn invalid_params_rejected(max_pending: u32, min_pending: u32, flush_mb: u32) {
        let params = DeviceParams {
            max_pending_mb: max_pending,
            min_pending_mb: min_pending,
            log_flush_interval_mb: flush_mb,
            ..DeviceParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn name_length_is_bounded() {
        let params = DeviceParams {
            name: "x".repeat(DEVICE_NAME_MAX),
            ..DeviceParams::default()
        };
        assert!(matches!(params.validate(), Err(ParamError::NameTooLong(_))));
    }

    #[test]
    fn sector_conversions() {
        let params = DeviceParams::default();
        assert_eq!(params.max_pending_sectors(), 32 * 2048);
        assert_eq!(params.min_pending_sectors(), 16 * 2048);
        assert_eq!(params.log_flush_interval_pb(4096), 16 * 256);
        assert_eq!(params.max_logpack_pb(4096), 0);

        let params = DeviceParams {
            max_logpack_kb: 1024,
            ..DeviceParams::default()
        };
        assert_eq!(params.max_logpack_pb(4096), 256);
        assert_eq!(params.max_logpack_pb(512), 2048);
    }
}
