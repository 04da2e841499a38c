// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wlog file format
//!
//! A wlog file is one PBS-sized file header followed by the raw logpack
//! stream exactly as it sits on the ring: header block, then payload
//! blocks (padding payload included). Packs are contiguous in lsid.

use crate::error::WlogError;
use crate::ring::PackData;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use walb_core::codec::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};
use walb_core::logpack::SECTOR_TYPE_WLOG_HEADER;
use walb_core::superblock::WALB_VERSION;
use walb_core::{checksum, is_valid_pbs, LogpackHeader, Superblock, LOGICAL_BLOCK_SIZE};

/// wlog file header, stored in the first PBS-sized block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WlogFileHeader {
    pub logical_bs: u32,
    pub physical_bs: u32,
    pub log_checksum_salt: u32,
    pub uuid: [u8; 16],
    pub begin_lsid: u64,
    pub end_lsid: u64,
}

impl WlogFileHeader {
    /// Header for an extraction window starting at `begin_lsid` on the
    /// device described by `sb`.
    pub fn new(sb: &Superblock, begin_lsid: u64) -> Self {
        Self {
            logical_bs: sb.logical_bs,
            physical_bs: sb.physical_bs,
            log_checksum_salt: sb.log_checksum_salt,
            uuid: sb.uuid,
            begin_lsid,
            end_lsid: begin_lsid,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.physical_bs as usize);
        buf.fill(0);
        put_u16(buf, 4, SECTOR_TYPE_WLOG_HEADER);
        put_u16(buf, 6, WALB_VERSION);
        put_u32(buf, 8, self.logical_bs);
        put_u32(buf, 12, self.physical_bs);
        put_u32(buf, 20, self.log_checksum_salt);
        buf[24..40].copy_from_slice(&self.uuid);
        put_u64(buf, 40, self.begin_lsid);
        put_u64(buf, 48, self.end_lsid);
        let sum = checksum(buf, 0);
        put_u32(buf, 0, sum);
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WlogError> {
        if buf.len() < 56 {
            return Err(WlogError::InvalidFileHeader(format!(
                "header too small: {} bytes",
                buf.len()
            )));
        }
        let sector_type = get_u16(buf, 4);
        if sector_type != SECTOR_TYPE_WLOG_HEADER {
            return Err(WlogError::InvalidFileHeader(format!(
                "bad sector type {sector_type:#06x}"
            )));
        }
        let version = get_u16(buf, 6);
        if version != WALB_VERSION {
            return Err(WlogError::InvalidFileHeader(format!(
                "unsupported version {version}"
            )));
        }
        let stored = get_u32(buf, 0);
        let mut copy = buf.to_vec();
        put_u32(&mut copy, 0, 0);
        if checksum(&copy, 0) != stored {
            return Err(WlogError::InvalidFileHeader(
                "checksum mismatch".to_string(),
            ));
        }
        let physical_bs = get_u32(buf, 12);
        if !is_valid_pbs(physical_bs) {
            return Err(WlogError::InvalidFileHeader(format!(
                "bad physical block size {physical_bs}"
            )));
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[24..40]);
        Ok(Self {
            logical_bs: get_u32(buf, 8),
            physical_bs,
            log_checksum_salt: get_u32(buf, 20),
            uuid,
            begin_lsid: get_u64(buf, 40),
            end_lsid: get_u64(buf, 48),
        })
    }
}

/// Appends logpacks to a wlog file; the header's `end_lsid` is fixed up
/// on [`finish`](WlogWriter::finish).
pub struct WlogWriter {
    file: File,
    header: WlogFileHeader,
    n_packs: u64,
}

impl WlogWriter {
    pub fn create(path: &Path, header: WlogFileHeader) -> Result<Self, WlogError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut buf = vec![0u8; header.physical_bs as usize];
        header.encode(&mut buf);
        file.write_all(&buf)?;
        Ok(Self {
            file,
            header,
            n_packs: 0,
        })
    }

    pub fn append_pack(&mut self, pack: &PackData) -> Result<(), WlogError> {
        if pack.header.logpack_lsid != self.header.end_lsid {
            return Err(WlogError::NonContiguous {
                expected: self.header.end_lsid,
                got: pack.header.logpack_lsid,
            });
        }
        let mut buf = vec![0u8; self.header.physical_bs as usize];
        pack.header.encode(&mut buf);
        self.file.write_all(&buf)?;
        self.file.write_all(&pack.payload)?;
        self.header.end_lsid = pack.header.next_lsid();
        self.n_packs += 1;
        Ok(())
    }

    pub fn n_packs(&self) -> u64 {
        self.n_packs
    }

    /// Rewrite the header with the final `end_lsid` and sync the file.
    pub fn finish(mut self) -> Result<WlogFileHeader, WlogError> {
        let mut buf = vec![0u8; self.header.physical_bs as usize];
        self.header.encode(&mut buf);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        self.file.sync_all()?;
        Ok(self.header)
    }
}

/// Iterates packs from a wlog file, validating as it goes.
pub struct WlogReader {
    file: File,
    header: WlogFileHeader,
    cursor: u64,
}

impl WlogReader {
    pub fn open(path: &Path) -> Result<Self, WlogError> {
        let mut file = File::open(path)?;
        // Probe with the smallest PBS; re-read when the header says 4096.
        let mut buf = vec![0u8; 512];
        file.read_exact(&mut buf)?;
        if get_u32(&buf, 12) == 4096 {
            file.seek(SeekFrom::Start(0))?;
            buf = vec![0u8; 4096];
            file.read_exact(&mut buf)?;
        }
        let header = WlogFileHeader::decode(&buf)?;
        let cursor = header.begin_lsid;
        Ok(Self {
            file,
            header,
            cursor,
        })
    }

    pub fn header(&self) -> &WlogFileHeader {
        &self.header
    }

    /// Read and validate the next pack; `None` at end of stream.
    pub fn next_pack(&mut self) -> Result<Option<PackData>, WlogError> {
        if self.cursor >= self.header.end_lsid {
            return Ok(None);
        }
        let pbs = self.header.physical_bs as usize;
        let mut hbuf = vec![0u8; pbs];
        self.file.read_exact(&mut hbuf)?;

        if !LogpackHeader::verify_buf(&hbuf, self.header.log_checksum_salt) {
            return Err(WlogError::InvalidPackHeader {
                lsid: self.cursor,
                reason: "header checksum mismatch".to_string(),
            });
        }
        let header = LogpackHeader::decode(&hbuf, self.header.physical_bs)?;
        if header.logpack_lsid != self.cursor {
            return Err(WlogError::NonContiguous {
                expected: self.cursor,
                got: header.logpack_lsid,
            });
        }
        if header.n_records() == 0 || !header.is_valid() {
            return Err(WlogError::InvalidPackHeader {
                lsid: self.cursor,
                reason: "inconsistent record table".to_string(),
            });
        }

        let mut payload = vec![0u8; usize::from(header.total_io_size) * pbs];
        self.file.read_exact(&mut payload)?;

        for rec in header.records() {
            if rec.is_padding() || rec.is_discard() {
                continue;
            }
            let start = (usize::from(rec.lsid_local) - 1) * pbs;
            let len = usize::from(rec.io_size_lb) * LOGICAL_BLOCK_SIZE as usize;
            if walb_core::checksum(&payload[start..start + len], self.header.log_checksum_salt)
                != rec.checksum
            {
                return Err(WlogError::RecordChecksumMismatch { lsid: rec.lsid });
            }
        }

        self.cursor = header.next_lsid();
        Ok(Some(PackData { header, payload }))
    }
}

impl Iterator for WlogReader {
    type Item = Result<PackData, WlogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pack().transpose()
    }
}
