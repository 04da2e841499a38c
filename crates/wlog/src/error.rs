// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for log stream tooling

use thiserror::Error;
use walb_bdev::BdevError;
use walb_core::FormatError;

#[derive(Debug, Error)]
pub enum WlogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("device error: {0}")]
    Bdev(#[from] BdevError),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("invalid logpack header at lsid {lsid}: {reason}")]
    InvalidPackHeader { lsid: u64, reason: String },
    #[error("record checksum mismatch at lsid {lsid}")]
    RecordChecksumMismatch { lsid: u64 },
    #[error("invalid wlog file header: {0}")]
    InvalidFileHeader(String),
    #[error("wlog stream is not contiguous: expected lsid {expected}, got {got}")]
    NonContiguous { expected: u64, got: u64 },
}
