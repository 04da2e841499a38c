// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Superblock codec and LDEV layout
//!
//! LDEV layout (byte offsets):
//!
//! | Offset | Size | Contents |
//! |---|---|---|
//! | 0 | 4 KiB | reserved |
//! | 4 KiB | PBS | superblock0 |
//! | 4 KiB + PBS | `snapshot_metadata_size * PBS` | deprecated metadata area |
//! | ... + PBS | PBS | superblock1 (unused) |
//! | remainder | `ring_buffer_size * PBS` | logpack ring buffer |
//!
//! The deprecated snapshot metadata area is sized and skipped, never
//! interpreted. The superblock checksum is unsalted (the salt itself
//! lives in the superblock).

use crate::block::is_valid_pbs;
use crate::checksum::checksum;
use crate::codec::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};
use crate::error::FormatError;
use crate::logpack::SECTOR_TYPE_SUPER;

/// Byte offset of superblock0 on the LDEV.
pub const SUPERBLOCK0_OFFSET: u64 = 4096;

/// On-disk format version.
pub const WALB_VERSION: u16 = 1;

/// Maximum device name length in bytes (NUL-padded on disk).
pub const DEVICE_NAME_MAX: usize = 64;

const SUPERBLOCK_MIN_SIZE: usize = 136;

/// The device superblock, stored at [`SUPERBLOCK0_OFFSET`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub logical_bs: u32,
    pub physical_bs: u32,
    /// Size of the deprecated metadata area in physical blocks.
    pub snapshot_metadata_size: u32,
    pub log_checksum_salt: u32,
    pub uuid: [u8; 16],
    pub name: String,
    /// Ring buffer size in physical blocks.
    pub ring_buffer_size: u64,
    pub oldest_lsid: u64,
    pub written_lsid: u64,
    /// Exposed device size in logical blocks.
    pub device_size_lb: u64,
}

impl Superblock {
    /// First physical block of the ring buffer.
    ///
    /// Reserved area, superblock0, the metadata area and superblock1 all
    /// precede it.
    pub fn ring_buffer_offset_pb(&self) -> u64 {
        let reserved_pb = 4096 / u64::from(self.physical_bs);
        reserved_pb.max(1) + 1 + u64::from(self.snapshot_metadata_size) + 1
    }

    /// Encode into a PBS-sized buffer, computing the checksum.
    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.physical_bs as usize);
        assert!(self.name.len() < DEVICE_NAME_MAX);
        buf.fill(0);
        put_u16(buf, 4, SECTOR_TYPE_SUPER);
        put_u16(buf, 6, WALB_VERSION);
        put_u32(buf, 8, self.logical_bs);
        put_u32(buf, 12, self.physical_bs);
        put_u32(buf, 16, self.snapshot_metadata_size);
        put_u32(buf, 20, self.log_checksum_salt);
        buf[24..40].copy_from_slice(&self.uuid);
        put_u64(buf, 40, self.ring_buffer_size);
        put_u64(buf, 48, self.oldest_lsid);
        put_u64(buf, 56, self.written_lsid);
        put_u64(buf, 64, self.device_size_lb);
        buf[72..72 + self.name.len()].copy_from_slice(self.name.as_bytes());
        let sum = checksum(buf, 0);
        put_u32(buf, 0, sum);
    }

    /// Decode and verify a superblock sector.
    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < SUPERBLOCK_MIN_SIZE {
            return Err(FormatError::InvalidSuperblock(format!(
                "sector too small: {} bytes",
                buf.len()
            )));
        }
        let sector_type = get_u16(buf, 4);
        if sector_type != SECTOR_TYPE_SUPER {
            return Err(FormatError::InvalidSectorType {
                expected: SECTOR_TYPE_SUPER,
                got: sector_type,
            });
        }
        let version = get_u16(buf, 6);
        if version != WALB_VERSION {
            return Err(FormatError::InvalidVersion(version));
        }

        let stored = get_u32(buf, 0);
        let mut copy = buf.to_vec();
        put_u32(&mut copy, 0, 0);
        if checksum(&copy, 0) != stored {
            return Err(FormatError::ChecksumMismatch);
        }

        let physical_bs = get_u32(buf, 12);
        if !is_valid_pbs(physical_bs) {
            return Err(FormatError::InvalidPbs(physical_bs));
        }
        if buf.len() != physical_bs as usize {
            return Err(FormatError::InvalidSuperblock(format!(
                "sector size {} != pbs {}",
                buf.len(),
                physical_bs
            )));
        }

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[24..40]);
        let name_bytes = &buf[72..72 + DEVICE_NAME_MAX];
        let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(DEVICE_NAME_MAX);
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        Ok(Self {
            logical_bs: get_u32(buf, 8),
            physical_bs,
            snapshot_metadata_size: get_u32(buf, 16),
            log_checksum_salt: get_u32(buf, 20),
            uuid,
            name,
            ring_buffer_size: get_u64(buf, 40),
            oldest_lsid: get_u64(buf, 48),
            written_lsid: get_u64(buf, 56),
            device_size_lb: get_u64(buf, 64),
        })
    }
}

#[cfg(test)]
#[path = "superblock_tests.rs"]
mod tests;
