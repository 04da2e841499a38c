// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reading logpacks from the LDEV ring
//!
//! The ring position of lsid `L` is `L mod ring_buffer_pb +
//! ring_buffer_off` physical blocks. Payloads never wrap (the pack
//! builder pads to the ring edge), but a pack's header and payload may
//! sit on opposite sides of the edge, so blocks are fetched one ring
//! position at a time.

use crate::error::WlogError;
use walb_bdev::Bdev;
use walb_core::logpack::max_n_records;
use walb_core::{addr_lb, LogpackHeader, Superblock, LOGICAL_BLOCK_SIZE};

/// One logpack lifted off the ring: decoded header plus raw payload
/// blocks (`total_io_size * pbs` bytes, padding payload included).
#[derive(Clone, Debug)]
pub struct PackData {
    pub header: LogpackHeader,
    pub payload: Vec<u8>,
}

impl PackData {
    /// Payload bytes of a record, without the physical-block padding.
    pub fn record_data(&self, rec_index: usize) -> &[u8] {
        let rec = &self.header.records()[rec_index];
        debug_assert!(!rec.is_discard());
        let pbs = self.header.pbs() as usize;
        let start = (usize::from(rec.lsid_local) - 1) * pbs;
        let len = usize::from(rec.io_size_lb) * LOGICAL_BLOCK_SIZE as usize;
        &self.payload[start..start + len]
    }
}

/// Sequential logpack reader over `[cursor, end)` of an LDEV ring.
pub struct RingReader<'a> {
    ldev: &'a dyn Bdev,
    pbs: u32,
    salt: u32,
    ring_off_pb: u64,
    ring_size_pb: u64,
    cursor: u64,
    end: u64,
}

impl<'a> RingReader<'a> {
    pub fn new(ldev: &'a dyn Bdev, sb: &Superblock, begin_lsid: u64, end_lsid: u64) -> Self {
        Self {
            ldev,
            pbs: sb.physical_bs,
            salt: sb.log_checksum_salt,
            ring_off_pb: sb.ring_buffer_offset_pb(),
            ring_size_pb: sb.ring_buffer_size,
            cursor: begin_lsid,
            end: end_lsid,
        }
    }

    /// The lsid the next pack must start at.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn read_pb(&self, lsid: u64, buf: &mut [u8]) -> Result<(), WlogError> {
        let pb = lsid % self.ring_size_pb + self.ring_off_pb;
        self.ldev.read_at(addr_lb(self.pbs, pb), buf)?;
        Ok(())
    }

    /// Read and validate the next pack, or `None` once `end` is reached.
    ///
    /// Errors identify the first invalid header or record; the cursor is
    /// left on the failing pack so callers can report the stop position.
    pub fn next_pack(&mut self) -> Result<Option<PackData>, WlogError> {
        if self.cursor >= self.end {
            return Ok(None);
        }

        let pbs = self.pbs as usize;
        let mut hbuf = vec![0u8; pbs];
        self.read_pb(self.cursor, &mut hbuf)?;

        if !LogpackHeader::verify_buf(&hbuf, self.salt) {
            return Err(WlogError::InvalidPackHeader {
                lsid: self.cursor,
                reason: "header checksum mismatch".to_string(),
            });
        }
        let header = LogpackHeader::decode(&hbuf, self.pbs)?;
        if header.logpack_lsid != self.cursor {
            return Err(WlogError::InvalidPackHeader {
                lsid: self.cursor,
                reason: format!("header claims lsid {}", header.logpack_lsid),
            });
        }
        if header.n_records() == 0 || !header.is_valid() {
            return Err(WlogError::InvalidPackHeader {
                lsid: self.cursor,
                reason: "inconsistent record table".to_string(),
            });
        }
        debug_assert!(usize::from(header.n_records()) <= max_n_records(self.pbs));

        let total_pb = u64::from(header.total_io_size);
        let mut payload = vec![0u8; (total_pb as usize) * pbs];
        for i in 0..total_pb {
            let off = (i as usize) * pbs;
            self.read_pb(self.cursor + 1 + i, &mut payload[off..off + pbs])?;
        }

        for (i, rec) in header.records().iter().enumerate() {
            if rec.is_padding() || rec.is_discard() {
                continue;
            }
            let start = (usize::from(rec.lsid_local) - 1) * pbs;
            let len = usize::from(rec.io_size_lb) * LOGICAL_BLOCK_SIZE as usize;
            let data = &payload[start..start + len];
            if walb_core::checksum(data, self.salt) != rec.checksum {
                return Err(WlogError::RecordChecksumMismatch { lsid: header.records()[i].lsid });
            }
        }

        self.cursor = header.next_lsid();
        Ok(Some(PackData { header, payload }))
    }
}

impl Iterator for RingReader<'_> {
    type Item = Result<PackData, WlogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pack().transpose()
    }
}
