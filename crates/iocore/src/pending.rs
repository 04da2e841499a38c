// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pending-data index
//!
//! Tracks writes whose logpack is complete but whose data-device write
//! has not finished. Readers patch their buffers from this index so a
//! read always returns the most-recently-accepted bytes for every
//! position, persisted or not.
//!
//! An ordered multimap keyed by `pos_lb`; range scans are bounded below
//! by `pos_lb - max_sectors_seen` because no entry is longer than the
//! high-water length. Entries are non-owning in the lifecycle sense:
//! the completion path removes them before the wrapper is retired.
//! Discards are accounted in `pending_sectors` (as one sector of
//! metadata) but never indexed; an in-flight discard is not visible to
//! readers.

use crate::wrapper::{BioWrapper, STATE_OVERWRITTEN};
use std::collections::BTreeMap;
use std::sync::Arc;
use walb_core::LOGICAL_BLOCK_SIZE;

/// A byte range to overlay on a read buffer.
pub struct Patch {
    pub pos_lb: u64,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct PendingIndex {
    map: BTreeMap<u64, Vec<Arc<BioWrapper>>>,
    /// High-water mark of entry lengths; bounds range scans.
    max_sectors: u32,
    /// Sum of pending lengths; discards count as 1.
    pending_sectors: u64,
    n_entries: usize,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_sectors(&self) -> u64 {
        self.pending_sectors
    }

    pub fn add_sectors(&mut self, n: u64) {
        self.pending_sectors += n;
    }

    pub fn sub_sectors(&mut self, n: u64) {
        debug_assert!(self.pending_sectors >= n);
        self.pending_sectors -= n;
    }

    pub fn max_sectors(&self) -> u32 {
        self.max_sectors
    }

    pub fn len(&self) -> usize {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    /// Insert a write. Older entries fully covered by this one are
    /// marked `overwritten` and dropped from the index; their completion
    /// path skips the delete.
    pub fn insert(&mut self, w: &Arc<BioWrapper>) {
        debug_assert!(!w.is_discard() && !w.is_zero_flush());

        let mut victims: Vec<(u64, u64)> = Vec::new();
        for (&pos, entries) in self.map.range(w.pos_lb..w.end_lb()) {
            for e in entries {
                if e.id < w.id && e.end_lb() <= w.end_lb() {
                    victims.push((pos, e.id));
                }
            }
        }
        for (pos, id) in victims {
            if let Some(entries) = self.map.get_mut(&pos) {
                if let Some(i) = entries.iter().position(|e| e.id == id) {
                    entries[i].set_state(STATE_OVERWRITTEN);
                    entries.remove(i);
                    self.n_entries -= 1;
                }
                if entries.is_empty() {
                    self.map.remove(&pos);
                }
            }
        }

        self.max_sectors = self.max_sectors.max(w.len_lb);
        self.map.entry(w.pos_lb).or_default().push(Arc::clone(w));
        self.n_entries += 1;
    }

    /// Remove a completed write unless it was overwritten (its entry is
    /// already gone).
    pub fn delete(&mut self, w: &Arc<BioWrapper>) {
        if w.has_state(STATE_OVERWRITTEN) {
            return;
        }
        if let Some(entries) = self.map.get_mut(&w.pos_lb) {
            if let Some(i) = entries.iter().position(|e| e.id == w.id) {
                entries.remove(i);
                self.n_entries -= 1;
            }
            if entries.is_empty() {
                self.map.remove(&w.pos_lb);
            }
        }
    }

    /// Collect the byte ranges a read of `[pos_lb, pos_lb + len_lb)`
    /// must overlay, oldest write first so that applying them in order
    /// leaves the newest bytes on top.
    ///
    /// The caller holds the index lock across the copy so completion
    /// deletes cannot race the capture.
    pub fn collect_patches(&self, pos_lb: u64, len_lb: u32) -> Vec<Patch> {
        let end_lb = pos_lb + u64::from(len_lb);
        let scan_from = pos_lb.saturating_sub(u64::from(self.max_sectors));

        let mut hits: Vec<&Arc<BioWrapper>> = Vec::new();
        for (_, entries) in self.map.range(scan_from..end_lb) {
            for e in entries {
                if e.pos_lb < end_lb && pos_lb < e.end_lb() {
                    hits.push(e);
                }
            }
        }
        hits.sort_by_key(|e| e.id);

        let lbs = LOGICAL_BLOCK_SIZE as usize;
        hits.iter()
            .filter_map(|e| {
                let data = e.data()?;
                let ov_start = e.pos_lb.max(pos_lb);
                let ov_end = e.end_lb().min(end_lb);
                let from = ((ov_start - e.pos_lb) as usize) * lbs;
                let to = ((ov_end - e.pos_lb) as usize) * lbs;
                Some(Patch {
                    pos_lb: ov_start,
                    data: data[from..to].to_vec(),
                })
            })
            .collect()
    }
}

/// Overlay patches onto a read buffer that starts at `buf_pos_lb`.
pub fn apply_patches(buf: &mut [u8], buf_pos_lb: u64, patches: &[Patch]) {
    let lbs = LOGICAL_BLOCK_SIZE as usize;
    for patch in patches {
        let off = ((patch.pos_lb - buf_pos_lb) as usize) * lbs;
        buf[off..off + patch.data.len()].copy_from_slice(&patch.data);
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
