// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for format and parameter validation

use thiserror::Error;

/// Errors from decoding on-disk sectors
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid sector type: expected {expected:#06x}, got {got:#06x}")]
    InvalidSectorType { expected: u16, got: u16 },
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("unsupported physical block size: {0}")]
    InvalidPbs(u32),
    #[error("unsupported format version: {0}")]
    InvalidVersion(u16),
    #[error("invalid logpack header: {0}")]
    InvalidLogpack(String),
    #[error("invalid superblock: {0}")]
    InvalidSuperblock(String),
}

/// Errors from device parameter validation
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("device name too long: {0} bytes (max 63)")]
    NameTooLong(usize),
    #[error("device name must not contain NUL bytes")]
    NameContainsNul,
    #[error("max_pending_mb must be > 0")]
    ZeroMaxPending,
    #[error("min_pending_mb must be > 0")]
    ZeroMinPending,
    #[error("min_pending_mb ({min}) must not exceed max_pending_mb ({max})")]
    PendingRangeInverted { min: u32, max: u32 },
    #[error("log_flush_interval_mb ({flush}) must be at most half of max_pending_mb ({max})")]
    FlushIntervalTooLarge { flush: u32, max: u32 },
}
