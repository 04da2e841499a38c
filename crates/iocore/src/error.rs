// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the I/O pipeline

use thiserror::Error;
use walb_bdev::BdevError;
use walb_core::ParamError;
use walb_wlog::WlogError;

/// Errors from device-level operations.
#[derive(Debug, Error)]
pub enum IoCoreError {
    #[error("device error: {0}")]
    Bdev(#[from] BdevError),
    #[error("format error: {0}")]
    Format(#[from] walb_bdev::FormatLdevError),
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),
    #[error("log recovery error: {0}")]
    Recovery(#[from] WlogError),
    #[error("device is read-only")]
    ReadOnly,
    #[error("device is in failure state")]
    Failure,
    #[error("invalid control input: {0}")]
    InvalidInput(String),
}

/// Per-request completion status reported to the client.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum IoError {
    #[error("I/O error")]
    Io,
    #[error("device is read-only")]
    ReadOnly,
    #[error("write would overflow the log ring buffer")]
    Overflow,
}
