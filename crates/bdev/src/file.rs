// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed block device
//!
//! Backs a device with a regular file (or an actual block special file).
//! The file is locked exclusively so two processes cannot drive the same
//! image; the lock is released when the device is dropped.

use crate::bdev::{check_access, Bdev, BdevError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt as UnixFileExt;
use std::path::{Path, PathBuf};
use walb_core::LOGICAL_BLOCK_SIZE;

pub struct FileBdev {
    file: File,
    path: PathBuf,
    size_lb: u64,
}

impl FileBdev {
    /// Open an existing image read-write with an exclusive lock.
    pub fn open(path: &Path) -> Result<Self, BdevError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(BdevError::Locked(path.to_path_buf()));
        }
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size_lb: size / u64::from(LOGICAL_BLOCK_SIZE),
        })
    }

    /// Create (or truncate) an image of `size_lb` logical blocks.
    pub fn create(path: &Path, size_lb: u64) -> Result<Self, BdevError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(BdevError::Locked(path.to_path_buf()));
        }
        file.set_len(size_lb * u64::from(LOGICAL_BLOCK_SIZE))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size_lb,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Bdev for FileBdev {
    fn size_lb(&self) -> u64 {
        self.size_lb
    }

    fn read_at(&self, pos_lb: u64, buf: &mut [u8]) -> Result<(), BdevError> {
        check_access(self.size_lb, pos_lb, buf.len())?;
        self.file
            .read_exact_at(buf, pos_lb * u64::from(LOGICAL_BLOCK_SIZE))?;
        Ok(())
    }

    fn write_at(&self, pos_lb: u64, buf: &[u8]) -> Result<(), BdevError> {
        check_access(self.size_lb, pos_lb, buf.len())?;
        self.file
            .write_all_at(buf, pos_lb * u64::from(LOGICAL_BLOCK_SIZE))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), BdevError> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
