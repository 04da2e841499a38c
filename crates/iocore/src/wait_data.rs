// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wait-data stage
//!
//! Collects data-device completions in FIFO order: demotes the device
//! on error, releases overlap successors (submitting those whose count
//! reached zero), removes the pending-index entry, re-opens the
//! submission queue when backpressure relaxes, and signals the GC
//! stage.

use crate::device::{melt_device, DeviceInner};
use crate::state::STATE_WAIT_DATA_WORKING;
use crate::submit_data::submit_data_write;
use crate::wrapper::{BioWrapper, STATE_COMPLETED, STATE_DELAYED, STATE_SUBMITTED};
use std::sync::Arc;

pub(crate) fn task(dev: &Arc<DeviceInner>) {
    loop {
        let batch: Vec<Arc<BioWrapper>> = {
            let mut queue = dev
                .queues
                .data_wait
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                dev.state.clear(STATE_WAIT_DATA_WORKING);
                break;
            }
            let n = queue.len().min(dev.params.n_io_bulk);
            queue.drain(..n).collect()
        };

        for w in batch {
            wait_for_write_bio_wrapper(dev, &w);
        }
    }
}

fn wait_for_write_bio_wrapper(dev: &Arc<DeviceInner>, w: &Arc<BioWrapper>) {
    // FIFO processing guarantees every predecessor completed earlier in
    // this loop, so a formerly-delayed wrapper has been submitted by
    // the time it is reached.
    debug_assert!(w.has_state(STATE_SUBMITTED));

    let error = w.error();
    if error.is_some() {
        dev.state.set_read_only();
        tracing::error!(
            name = %dev.name,
            pos_lb = w.pos_lb,
            "data IO error; device becomes read-only"
        );
    }
    w.set_state(STATE_COMPLETED);

    // Release successors whose overlap count reached zero.
    let ready = {
        let mut overlap = dev.overlap.lock().unwrap_or_else(|e| e.into_inner());
        overlap.delete_and_collect_ready(w)
    };
    for successor in &ready {
        debug_assert!(successor.has_state(STATE_DELAYED));
        submit_data_write(dev, successor);
    }

    // Drop the pending entry and decide whether backpressure relaxes.
    let is_start = {
        let mut pending = dev.pending.lock().unwrap_or_else(|e| e.into_inner());
        let sub = if w.is_discard() { 1 } else { u64::from(w.len_lb) };
        let is_start = if pending.under_throttle {
            let total = pending.index.pending_sectors();
            let is_size = total < sub || total - sub < dev.params.min_pending_sectors();
            let is_timeout = dev.clock.now() >= pending.restart_deadline;
            if is_size || is_timeout {
                pending.under_throttle = false;
                true
            } else {
                false
            }
        } else {
            false
        };
        pending.index.sub_sectors(sub);
        if !w.is_discard() {
            pending.index.delete(w);
        }
        is_start
    };
    if is_start {
        melt_device(dev);
    }

    w.done.complete(match error {
        Some(e) => Err(e),
        None => Ok(()),
    });
}
