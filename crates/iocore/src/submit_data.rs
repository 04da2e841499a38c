// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submit-data stage
//!
//! Holds each batch behind the permanence gate (a data block is never
//! submitted before its logpack is durable), registers the batch with
//! the overlap serializer, optionally sorts by position, and issues the
//! non-delayed writes to the data device.

use crate::device::{enqueue_wait_data_task, DeviceInner};
use crate::error::IoError;
use crate::state::STATE_SUBMIT_DATA_WORKING;
use crate::wrapper::{BioWrapper, STATE_DELAYED, STATE_PREPARED, STATE_SUBMITTED};
use std::sync::Arc;
use std::time::Duration;
use walb_core::DiscardPolicy;

pub(crate) fn task(dev: &Arc<DeviceInner>) {
    loop {
        let batch: Vec<Arc<BioWrapper>> = {
            let mut queue = dev
                .queues
                .data_submit
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                dev.state.clear(STATE_SUBMIT_DATA_WORKING);
                break;
            }
            let n = queue.len().min(dev.params.n_io_bulk);
            queue.drain(..n).collect()
        };

        // The queue is in lsid order; gating on the last lsid covers
        // the whole batch.
        let last_lsid = batch.last().map(|w| w.lsid()).unwrap_or(0);
        wait_for_log_permanent(dev, last_lsid);

        {
            let mut overlap = dev.overlap.lock().unwrap_or_else(|e| e.into_inner());
            for w in &batch {
                overlap.insert(w);
            }
        }

        let mut ready: Vec<Arc<BioWrapper>> = Vec::with_capacity(batch.len());
        for w in &batch {
            if w.has_state(STATE_DELAYED) {
                continue;
            }
            debug_assert_eq!(w.n_overlapped(), 0);
            if dev.tunables.is_sort_data_io {
                insert_sorted_by_pos(&mut ready, w);
            } else {
                ready.push(Arc::clone(w));
            }
        }
        for w in &ready {
            submit_data_write(dev, w);
        }

        {
            let mut queue = dev
                .queues
                .data_wait
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            for w in batch {
                queue.push_back(w);
            }
        }
        enqueue_wait_data_task(dev);
    }
}

/// Insertion sort by position: O(n^2) worst case, O(n) for the
/// sequential workloads that dominate in practice.
fn insert_sorted_by_pos(list: &mut Vec<Arc<BioWrapper>>, w: &Arc<BioWrapper>) {
    let mut i = list.len();
    while i > 0 && list[i - 1].pos_lb > w.pos_lb {
        i -= 1;
    }
    list.insert(i, Arc::clone(w));
}

/// Issue one write (or discard) to the data device. Flush semantics are
/// intentionally absent here: the log's permanence already covers the
/// durability contract.
pub(crate) fn submit_data_write(dev: &Arc<DeviceInner>, w: &Arc<BioWrapper>) {
    debug_assert!(w.has_state(STATE_PREPARED));
    debug_assert_eq!(w.n_overlapped(), 0);
    w.set_state(STATE_SUBMITTED);

    let result = match w.data() {
        Some(data) => dev.ddev.write_at(w.pos_lb, data),
        None => {
            debug_assert!(w.is_discard());
            if dev.ddev.supports_discard() {
                dev.ddev.discard(w.pos_lb, w.len_lb)
            } else {
                match dev.tunables.discard_policy {
                    DiscardPolicy::Elide => Ok(()),
                    DiscardPolicy::LogOnly => {
                        tracing::debug!(
                            pos_lb = w.pos_lb,
                            len_lb = w.len_lb,
                            "discard without DDEV support; metadata-only no-op"
                        );
                        Ok(())
                    }
                }
            }
        }
    };
    if let Err(e) = result {
        tracing::error!(
            name = %dev.name,
            pos_lb = w.pos_lb,
            len_lb = w.len_lb,
            error = %e,
            "data device write failed"
        );
        w.set_error(IoError::Io);
    }
}

/// Block until all log with lsid <= `lsid` is permanent.
///
/// Within the configured flush interval the gate naps in 1 ms steps and
/// lets the flush headers do the work; past it, it promotes the flush
/// watermark and forces an LDEV flush itself. A flush failure demotes
/// the device to read-only. Interval zero disables the gate entirely
/// (bench mode; consistency contract relaxed).
fn wait_for_log_permanent(dev: &Arc<DeviceInner>, lsid: u64) {
    if dev.params.log_flush_interval_ms == 0 {
        return;
    }
    let interval = dev.params.log_flush_interval();
    let interval_pb = dev.params.log_flush_interval_pb(dev.pbs);
    let timeout_deadline = dev.clock.now() + interval;

    loop {
        let (permanent, flush, completed, flush_deadline) = {
            let track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            (
                track.lsids.permanent,
                track.lsids.flush,
                track.lsids.completed,
                track.log_flush_deadline,
            )
        };
        if lsid < permanent {
            return;
        }
        if dev.state.is_read_only() {
            // The device is demoted; durability can no longer be
            // promised and the gate must not spin forever.
            return;
        }
        let now = dev.clock.now();
        if now < timeout_deadline && lsid < flush + interval_pb && now < flush_deadline {
            // Too early to force a flush; wait for one in flight.
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        if lsid >= completed {
            // The wait-log stage has not accounted this pack yet; a
            // flush now would not cover it.
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        // Force: promote the flush watermark and flush the log device.
        let completed = {
            let mut track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            if track.lsids.flush < track.lsids.latest {
                track.lsids.flush = track.lsids.latest;
                track.log_flush_deadline = dev.clock.now() + interval;
            }
            track.lsids.completed
        };
        if let Err(e) = dev.ldev.flush() {
            tracing::error!(
                name = %dev.name,
                error = %e,
                "log device flush failed; device becomes read-only"
            );
            dev.state.set_read_only();
            return;
        }
        // The flush makes every completed log write durable.
        dev.advance_permanent_to(completed);
    }
}
