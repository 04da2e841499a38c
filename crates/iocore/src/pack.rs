// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory write pack
//!
//! A pack groups the writes that will share one logpack header. It owns
//! its header and its wrappers; the pack itself is owned by whichever
//! queue currently holds it (log-wait, then GC).

use crate::wrapper::BioWrapper;
use std::sync::Arc;
use walb_core::LogpackHeader;

pub struct Pack {
    pub header: LogpackHeader,
    pub biows: Vec<Arc<BioWrapper>>,
    /// The pack holds a single zero-length flush and nothing else; it is
    /// submitted as a bare LDEV flush, no header or payload.
    pub is_zero_flush_only: bool,
    /// One or more member writes carried flush semantics.
    pub is_flush_contained: bool,
    /// The header write itself carries flush semantics to advance the
    /// permanent watermark.
    pub is_flush_header: bool,
    /// Log submission failed; members are failed in the wait stage.
    pub is_logpack_failed: bool,
}

impl Pack {
    pub fn new(pbs: u32, logpack_lsid: u64) -> Self {
        Self {
            header: LogpackHeader::new(pbs, logpack_lsid),
            biows: Vec::new(),
            is_zero_flush_only: false,
            is_flush_contained: false,
            is_flush_header: false,
            is_logpack_failed: false,
        }
    }

    /// A pack whose header holds no records but which carries a wrapper
    /// can only be the zero-flush case.
    pub fn is_zero_flush(&self) -> bool {
        self.header.n_records() == 0 && !self.biows.is_empty()
    }

    /// Mark the zero-flush state when the pack is sealed.
    pub fn check_and_set_zero_flush(&mut self) {
        if self.header.n_records() == 0 {
            debug_assert!(self.is_zero_flush());
            self.is_zero_flush_only = true;
        }
    }

    /// Cross-check wrappers against header records: every wrapper must
    /// line up with its record (position, size, lsid, discard flag), and
    /// a zero-length wrapper is permitted only alone.
    pub fn is_prepared_valid(&self) -> bool {
        if self.biows.is_empty() {
            return false;
        }
        if !self.header.is_valid() {
            return false;
        }

        let records = self.header.records();
        let mut i = 0usize;
        for biow in &self.biows {
            if biow.is_zero_flush() {
                if i != 0 || !records.is_empty() {
                    return false;
                }
                continue;
            }
            if i >= records.len() {
                return false;
            }
            let mut rec = &records[i];
            if rec.is_padding() {
                i += 1;
                if i >= records.len() {
                    return false;
                }
                rec = &records[i];
            }
            if biow.pos_lb != rec.offset_lb
                || u32::from(rec.io_size_lb) != biow.len_lb
                || biow.lsid() != rec.lsid
                || biow.is_discard() != rec.is_discard()
            {
                return false;
            }
            i += 1;
        }
        i == records.len()
    }
}

#[cfg(test)]
#[path = "pack_tests.rs"]
mod tests;
