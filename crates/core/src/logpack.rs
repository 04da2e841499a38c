// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logpack header and record codec
//!
//! A logpack is one PBS-sized header block followed by `total_io_size`
//! physical blocks of payload, written contiguously to the LDEV ring at
//! `logpack_lsid mod ring_buffer_pb`. The header carries one record per
//! client write; padding records fill the gap to the ring edge so no
//! single payload wraps around it, and discard records carry no payload
//! at all.

use crate::block::{capacity_pb, n_lb_in_pb};
use crate::checksum::checksum;
use crate::codec::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};
use crate::error::FormatError;

/// Sector type tag of a superblock.
pub const SECTOR_TYPE_SUPER: u16 = 0x0001;
/// Sector type tag of a logpack header.
pub const SECTOR_TYPE_LOGPACK: u16 = 0x0003;
/// Sector type tag of a wlog file header.
pub const SECTOR_TYPE_WLOG_HEADER: u16 = 0x0004;

/// Record flag: the record slot is in use.
pub const LOG_RECORD_EXIST: u32 = 1 << 0;
/// Record flag: ring-edge padding; payload blocks present, no data effect.
pub const LOG_RECORD_PADDING: u32 = 1 << 1;
/// Record flag: discard; no payload blocks on the LDEV.
pub const LOG_RECORD_DISCARD: u32 = 1 << 2;

/// Byte size of the fixed header portion.
pub const LOGPACK_HEADER_FIXED_SIZE: usize = 24;
/// Byte size of one record slot.
pub const LOG_RECORD_SIZE: usize = 32;

/// Maximum number of records a header block of the given PBS can carry.
pub fn max_n_records(pbs: u32) -> usize {
    (pbs as usize - LOGPACK_HEADER_FIXED_SIZE) / LOG_RECORD_SIZE
}

/// One record inside a logpack header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub checksum: u32,
    pub flags: u32,
    pub io_size_lb: u16,
    /// Offset of the payload inside the pack, in physical blocks.
    /// The header block itself is `lsid_local` 0.
    pub lsid_local: u16,
    pub offset_lb: u64,
    pub lsid: u64,
}

impl LogRecord {
    pub fn is_exist(&self) -> bool {
        self.flags & LOG_RECORD_EXIST != 0
    }

    pub fn is_padding(&self) -> bool {
        self.flags & LOG_RECORD_PADDING != 0
    }

    pub fn is_discard(&self) -> bool {
        self.flags & LOG_RECORD_DISCARD != 0
    }

    fn encode(&self, buf: &mut [u8]) {
        put_u32(buf, 0, self.checksum);
        put_u32(buf, 4, self.flags);
        put_u16(buf, 8, self.io_size_lb);
        put_u16(buf, 10, self.lsid_local);
        put_u32(buf, 12, 0);
        put_u64(buf, 16, self.offset_lb);
        put_u64(buf, 24, self.lsid);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            checksum: get_u32(buf, 0),
            flags: get_u32(buf, 4),
            io_size_lb: get_u16(buf, 8),
            lsid_local: get_u16(buf, 10),
            offset_lb: get_u64(buf, 16),
            lsid: get_u64(buf, 24),
        }
    }
}

/// In-memory logpack header.
///
/// Built up record by record while the pack builder assembles a pack,
/// then encoded into the PBS-sized header block for submission.
#[derive(Clone, Debug)]
pub struct LogpackHeader {
    pbs: u32,
    pub checksum: u32,
    pub logpack_lsid: u64,
    /// Payload size in physical blocks (padding included, discards not).
    pub total_io_size: u16,
    pub n_padding: u16,
    records: Vec<LogRecord>,
}

impl LogpackHeader {
    pub fn new(pbs: u32, logpack_lsid: u64) -> Self {
        Self {
            pbs,
            checksum: 0,
            logpack_lsid,
            total_io_size: 0,
            n_padding: 0,
            records: Vec::new(),
        }
    }

    pub fn pbs(&self) -> u32 {
        self.pbs
    }

    pub fn n_records(&self) -> u16 {
        self.records.len() as u16
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [LogRecord] {
        &mut self.records
    }

    /// The lsid right after this pack on the ring.
    ///
    /// A pack with no records writes nothing (a bare flush), so it does
    /// not consume log space. Otherwise the header block plus the payload
    /// blocks are consumed.
    pub fn next_lsid(&self) -> u64 {
        if self.records.is_empty() {
            self.logpack_lsid
        } else {
            self.logpack_lsid + 1 + u64::from(self.total_io_size)
        }
    }

    /// Total pack size on the ring in physical blocks (header included).
    pub fn pack_pb(&self) -> u64 {
        self.next_lsid() - self.logpack_lsid
    }

    /// Try to append a record for a write of `len_lb` logical blocks at
    /// `pos_lb`. Inserts a padding record first when the payload would
    /// cross the ring edge. Returns the lsid assigned to the write, or
    /// `None` when the header has no room (caller seals the pack and
    /// opens a new one).
    pub fn try_add(
        &mut self,
        pos_lb: u64,
        len_lb: u32,
        is_discard: bool,
        ring_buffer_pb: u64,
    ) -> Option<u64> {
        let max = max_n_records(self.pbs);
        if self.records.len() >= max {
            return None;
        }

        let io_pb = u64::from(capacity_pb(self.pbs, len_lb));
        let mut lsid_local = 1 + u64::from(self.total_io_size);

        let mut pad_pb = 0u64;
        if !is_discard {
            let off_in_ring = (self.logpack_lsid + lsid_local) % ring_buffer_pb;
            if off_in_ring + io_pb > ring_buffer_pb {
                pad_pb = ring_buffer_pb - off_in_ring;
            }
        }

        // Everything must still fit in the u16 payload counter and, with
        // padding, in the record table.
        let new_total = u64::from(self.total_io_size)
            + pad_pb
            + if is_discard { 0 } else { io_pb };
        if new_total > u64::from(u16::MAX) || lsid_local + pad_pb > u64::from(u16::MAX) {
            return None;
        }
        if pad_pb > 0 && self.records.len() + 2 > max {
            return None;
        }

        if pad_pb > 0 {
            let pad_lb = pad_pb * u64::from(n_lb_in_pb(self.pbs));
            self.records.push(LogRecord {
                checksum: 0,
                flags: LOG_RECORD_EXIST | LOG_RECORD_PADDING,
                io_size_lb: pad_lb as u16,
                lsid_local: lsid_local as u16,
                offset_lb: 0,
                lsid: self.logpack_lsid + lsid_local,
            });
            self.n_padding += 1;
            lsid_local += pad_pb;
        }

        let lsid = self.logpack_lsid + lsid_local;
        let mut flags = LOG_RECORD_EXIST;
        if is_discard {
            flags |= LOG_RECORD_DISCARD;
        }
        self.records.push(LogRecord {
            checksum: 0,
            flags,
            io_size_lb: len_lb as u16,
            lsid_local: lsid_local as u16,
            offset_lb: pos_lb,
            lsid,
        });
        self.total_io_size = new_total as u16;
        Some(lsid)
    }

    /// Encode into a PBS-sized buffer using the stored checksum field.
    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.pbs as usize);
        buf.fill(0);
        put_u32(buf, 0, self.checksum);
        put_u16(buf, 4, SECTOR_TYPE_LOGPACK);
        put_u16(buf, 6, self.total_io_size);
        put_u16(buf, 8, self.n_records());
        put_u16(buf, 10, self.n_padding);
        put_u64(buf, 16, self.logpack_lsid);
        for (i, rec) in self.records.iter().enumerate() {
            let off = LOGPACK_HEADER_FIXED_SIZE + i * LOG_RECORD_SIZE;
            rec.encode(&mut buf[off..off + LOG_RECORD_SIZE]);
        }
    }

    /// Compute and store the salted header checksum.
    ///
    /// Record checksums must be filled in first; the header checksum
    /// covers the whole encoded block with the checksum field zeroed.
    pub fn finalize_checksum(&mut self, salt: u32) {
        self.checksum = 0;
        let mut buf = vec![0u8; self.pbs as usize];
        self.encode(&mut buf);
        self.checksum = checksum(&buf, salt);
    }

    /// Decode a header block, verifying sector type and structure only.
    /// Use [`verify_buf`] for the checksum.
    pub fn decode(buf: &[u8], pbs: u32) -> Result<Self, FormatError> {
        if buf.len() != pbs as usize {
            return Err(FormatError::InvalidLogpack(format!(
                "header block size {} != pbs {}",
                buf.len(),
                pbs
            )));
        }
        let sector_type = get_u16(buf, 4);
        if sector_type != SECTOR_TYPE_LOGPACK {
            return Err(FormatError::InvalidSectorType {
                expected: SECTOR_TYPE_LOGPACK,
                got: sector_type,
            });
        }
        let n_records = get_u16(buf, 8) as usize;
        if n_records > max_n_records(pbs) {
            return Err(FormatError::InvalidLogpack(format!(
                "n_records {} exceeds capacity {}",
                n_records,
                max_n_records(pbs)
            )));
        }
        let mut records = Vec::with_capacity(n_records);
        for i in 0..n_records {
            let off = LOGPACK_HEADER_FIXED_SIZE + i * LOG_RECORD_SIZE;
            records.push(LogRecord::decode(&buf[off..off + LOG_RECORD_SIZE]));
        }
        Ok(Self {
            pbs,
            checksum: get_u32(buf, 0),
            logpack_lsid: get_u64(buf, 16),
            total_io_size: get_u16(buf, 6),
            n_padding: get_u16(buf, 10),
            records,
        })
    }

    /// Verify the salted checksum of an encoded header block.
    pub fn verify_buf(buf: &[u8], salt: u32) -> bool {
        if buf.len() < 4 {
            return false;
        }
        let stored = get_u32(buf, 0);
        let mut copy = buf.to_vec();
        put_u32(&mut copy, 0, 0);
        checksum(&copy, salt) == stored
    }

    /// Structural validity of an assembled header: flags, lsid chaining
    /// and payload accounting must all be consistent.
    pub fn is_valid(&self) -> bool {
        let mut total_pb = 0u64;
        let mut n_padding = 0u16;
        for rec in &self.records {
            if !rec.is_exist() {
                return false;
            }
            if rec.lsid != self.logpack_lsid + u64::from(rec.lsid_local) {
                return false;
            }
            if rec.is_padding() {
                n_padding += 1;
            }
            if !rec.is_discard() {
                if u64::from(rec.lsid_local) != 1 + total_pb {
                    return false;
                }
                total_pb += u64::from(capacity_pb(self.pbs, u32::from(rec.io_size_lb)));
            }
        }
        total_pb == u64::from(self.total_io_size) && n_padding == self.n_padding
    }
}

#[cfg(test)]
#[path = "logpack_tests.rs"]
mod tests;
