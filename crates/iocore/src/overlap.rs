// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The overlap serializer's table
//!
//! Data-device writes whose ranges intersect must reach the device in
//! the order they entered the data stage. Each write entering the stage
//! is inserted here with a count of intersecting in-flight predecessors;
//! a positive count marks it delayed. When a write completes it is
//! removed and every intersecting successor's count drops; those
//! reaching zero are ready to submit.
//!
//! By the time a write completes, every intersecting entry still in the
//! table is a successor: its own predecessors had to complete (and be
//! removed) before it could be submitted at all.

use crate::wrapper::{BioWrapper, STATE_DELAYED};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct OverlapIndex {
    map: BTreeMap<u64, Vec<Arc<BioWrapper>>>,
    /// High-water mark of entry lengths; bounds range scans.
    max_sectors: u32,
    n_entries: usize,
}

fn intersects(a: &BioWrapper, b: &BioWrapper) -> bool {
    a.pos_lb < b.end_lb() && b.pos_lb < a.end_lb()
}

impl OverlapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    /// Insert a write entering the data stage; returns the number of
    /// in-flight predecessors whose ranges intersect. A positive count
    /// sets the wrapper's delayed state.
    pub fn insert(&mut self, w: &Arc<BioWrapper>) -> u32 {
        let scan_from = w.pos_lb.saturating_sub(u64::from(self.max_sectors));
        let mut n = 0u32;
        for (_, entries) in self.map.range(scan_from..w.end_lb()) {
            for e in entries {
                if intersects(e, w) {
                    n += 1;
                }
            }
        }

        w.set_n_overlapped(n);
        if n > 0 {
            w.set_state(STATE_DELAYED);
        }
        self.max_sectors = self.max_sectors.max(w.len_lb);
        self.map.entry(w.pos_lb).or_default().push(Arc::clone(w));
        self.n_entries += 1;
        n
    }

    /// Remove a completed write and decrement every intersecting
    /// successor. Returns the successors that became ready, in key
    /// order.
    pub fn delete_and_collect_ready(&mut self, w: &Arc<BioWrapper>) -> Vec<Arc<BioWrapper>> {
        if let Some(entries) = self.map.get_mut(&w.pos_lb) {
            if let Some(i) = entries.iter().position(|e| e.id == w.id) {
                entries.remove(i);
                self.n_entries -= 1;
            }
            if entries.is_empty() {
                self.map.remove(&w.pos_lb);
            }
        }

        let scan_from = w.pos_lb.saturating_sub(u64::from(self.max_sectors));
        let mut ready = Vec::new();
        for (_, entries) in self.map.range(scan_from..w.end_lb()) {
            for e in entries {
                if !intersects(e, w) {
                    continue;
                }
                debug_assert!(e.n_overlapped() > 0);
                debug_assert!(e.has_state(STATE_DELAYED));
                if e.dec_n_overlapped() == 0 {
                    ready.push(Arc::clone(e));
                }
            }
        }
        ready
    }
}

#[cfg(test)]
#[path = "overlap_tests.rs"]
mod tests;
