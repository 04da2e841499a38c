// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The block device trait
//!
//! Devices are addressed in logical blocks of 512 bytes. Buffers must be
//! a whole number of logical blocks. Implementations are shared across
//! the pipeline stages, so all methods take `&self`.

use std::path::PathBuf;
use thiserror::Error;
use walb_core::LOGICAL_BLOCK_SIZE;

/// Errors from block device operations
#[derive(Debug, Error)]
pub enum BdevError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("out of range: pos {pos_lb} len {len_lb} on device of {size_lb} blocks")]
    OutOfRange { pos_lb: u64, len_lb: u64, size_lb: u64 },
    #[error("buffer is not logical-block aligned: {0} bytes")]
    Misaligned(usize),
    #[error("injected {0} failure")]
    Faulted(&'static str),
    #[error("device file is locked by another process: {0}")]
    Locked(PathBuf),
    #[error("discard not supported")]
    DiscardUnsupported,
}

/// A block device addressed in logical blocks.
pub trait Bdev: Send + Sync {
    /// Device size in logical blocks.
    fn size_lb(&self) -> u64;

    /// Read `buf.len()` bytes starting at logical block `pos_lb`.
    fn read_at(&self, pos_lb: u64, buf: &mut [u8]) -> Result<(), BdevError>;

    /// Write `buf` starting at logical block `pos_lb`.
    fn write_at(&self, pos_lb: u64, buf: &[u8]) -> Result<(), BdevError>;

    /// Make all completed writes durable.
    fn flush(&self) -> Result<(), BdevError>;

    /// Whether [`flush`](Bdev::flush) provides durability on this device.
    fn supports_flush(&self) -> bool {
        true
    }

    fn supports_discard(&self) -> bool {
        false
    }

    /// Discard a range. Only meaningful when
    /// [`supports_discard`](Bdev::supports_discard) is true.
    fn discard(&self, _pos_lb: u64, _len_lb: u32) -> Result<(), BdevError> {
        Err(BdevError::DiscardUnsupported)
    }
}

/// Validate an access against device bounds and buffer alignment.
pub(crate) fn check_access(size_lb: u64, pos_lb: u64, buf_len: usize) -> Result<(), BdevError> {
    if buf_len % LOGICAL_BLOCK_SIZE as usize != 0 {
        return Err(BdevError::Misaligned(buf_len));
    }
    let len_lb = (buf_len / LOGICAL_BLOCK_SIZE as usize) as u64;
    if pos_lb + len_lb > size_lb {
        return Err(BdevError::OutOfRange {
            pos_lb,
            len_lb,
            size_lb,
        });
    }
    Ok(())
}
