// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LDEV formatting and superblock I/O

use crate::bdev::{Bdev, BdevError};
use thiserror::Error;
use uuid::Uuid;
use walb_core::superblock::SUPERBLOCK0_OFFSET;
use walb_core::{is_valid_pbs, n_lb_in_pb, FormatError, Superblock, LOGICAL_BLOCK_SIZE};

/// Size of the deprecated snapshot metadata area in physical blocks.
/// Reserved for images formatted by older tools; never interpreted.
pub const SNAPSHOT_METADATA_PB: u32 = 8;

#[derive(Debug, Error)]
pub enum FormatLdevError {
    #[error("device error: {0}")]
    Bdev(#[from] BdevError),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("log device too small: {ldev_pb} blocks, need more than {header_pb}")]
    TooSmall { ldev_pb: u64, header_pb: u64 },
}

fn superblock_pos_lb() -> u64 {
    SUPERBLOCK0_OFFSET / u64::from(LOGICAL_BLOCK_SIZE)
}

/// Write a fresh superblock to `ldev`, deriving the ring buffer size from
/// the device size. Returns the resulting superblock.
pub fn format_ldev(
    ldev: &dyn Bdev,
    pbs: u32,
    name: &str,
    device_size_lb: u64,
) -> Result<Superblock, FormatLdevError> {
    if !is_valid_pbs(pbs) {
        return Err(FormatLdevError::Format(FormatError::InvalidPbs(pbs)));
    }
    if name.len() >= walb_core::superblock::DEVICE_NAME_MAX {
        return Err(FormatLdevError::Format(FormatError::InvalidSuperblock(
            format!("device name too long: {} bytes", name.len()),
        )));
    }

    let ldev_pb = ldev.size_lb() / u64::from(n_lb_in_pb(pbs));
    let mut sb = Superblock {
        logical_bs: LOGICAL_BLOCK_SIZE,
        physical_bs: pbs,
        snapshot_metadata_size: SNAPSHOT_METADATA_PB,
        log_checksum_salt: fresh_salt(),
        uuid: *Uuid::new_v4().as_bytes(),
        name: name.to_string(),
        ring_buffer_size: 0,
        oldest_lsid: 0,
        written_lsid: 0,
        device_size_lb,
    };
    let header_pb = sb.ring_buffer_offset_pb();
    if ldev_pb <= header_pb {
        return Err(FormatLdevError::TooSmall { ldev_pb, header_pb });
    }
    sb.ring_buffer_size = ldev_pb - header_pb;

    write_superblock(ldev, &sb, true)?;
    tracing::info!(
        name = %sb.name,
        pbs,
        ring_buffer_pb = sb.ring_buffer_size,
        "formatted log device"
    );
    Ok(sb)
}

/// Read and verify superblock0.
pub fn read_superblock(ldev: &dyn Bdev) -> Result<Superblock, FormatLdevError> {
    // The sector size is only known once the superblock is read; probe
    // with the smallest PBS and re-read when the field says 4096.
    let mut buf = vec![0u8; 512];
    ldev.read_at(superblock_pos_lb(), &mut buf)?;
    let pbs = walb_core::codec::get_u32(&buf, 12);
    if pbs == 4096 {
        buf = vec![0u8; 4096];
        ldev.read_at(superblock_pos_lb(), &mut buf)?;
    }
    Ok(Superblock::decode(&buf)?)
}

/// Write superblock0, optionally flushing the device afterwards.
pub fn write_superblock(
    ldev: &dyn Bdev,
    sb: &Superblock,
    sync: bool,
) -> Result<(), FormatLdevError> {
    let mut buf = vec![0u8; sb.physical_bs as usize];
    sb.encode(&mut buf);
    ldev.write_at(superblock_pos_lb(), &buf)?;
    if sync {
        ldev.flush()?;
    }
    Ok(())
}

/// Re-base the WAL: drop all log content beyond `written_lsid` and draw a
/// fresh checksum salt so stale ring contents can never verify again.
pub fn reset_wal(ldev: &dyn Bdev) -> Result<Superblock, FormatLdevError> {
    let mut sb = read_superblock(ldev)?;
    sb.oldest_lsid = sb.written_lsid;
    sb.log_checksum_salt = fresh_salt();
    write_superblock(ldev, &sb, true)?;
    tracing::info!(name = %sb.name, lsid = sb.written_lsid, "reset WAL");
    Ok(sb)
}

fn fresh_salt() -> u32 {
    let uuid = Uuid::new_v4();
    let b = uuid.as_bytes();
    u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
