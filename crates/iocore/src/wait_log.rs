// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wait-log stage
//!
//! Confirms each pack's log I/O, advances the `completed` and
//! `permanent` watermarks, acknowledges the client (fast path: a write
//! is acked once its logpack is complete), inserts writes into the
//! pending index (applying backpressure), and hands them to the data
//! stage. Packs then move to the GC queue.

use crate::device::{enqueue_submit_data_task, DeviceInner};
use crate::error::IoError;
use crate::notify::LsidEvent;
use crate::pack::Pack;
use crate::state::STATE_WAIT_LOG_WORKING;
use crate::wrapper::STATE_PREPARED;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn task(dev: &Arc<DeviceInner>) {
    loop {
        let mut packs: Vec<Pack> = {
            let mut queue = dev.queues.log_wait.lock().unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                dev.state.clear(STATE_WAIT_LOG_WORKING);
                break;
            }
            let n = queue.len().min(dev.params.n_pack_bulk);
            queue.drain(..n).collect()
        };

        for pack in &mut packs {
            wait_for_logpack_and_submit_datapack(dev, pack);
        }
        enqueue_submit_data_task(dev);

        dev.state
            .n_pending_gc
            .fetch_add(packs.len(), Ordering::AcqRel);
        {
            let mut gc = dev.queues.gc.lock().unwrap_or_else(|e| e.into_inner());
            for pack in packs {
                gc.push_back(pack);
            }
        }
        dev.queues.gc_cond.notify_one();
    }
}

fn wait_for_logpack_and_submit_datapack(dev: &Arc<DeviceInner>, pack: &mut Pack) {
    let mut is_failed = dev.state.is_read_only() || pack.is_logpack_failed;
    let logpack_lsid = pack.header.logpack_lsid;

    // A flush header makes all prior log durable by the time the header
    // block is on the device.
    if !is_failed && pack.is_flush_header {
        dev.advance_permanent_to(logpack_lsid);
    }

    let mut kept = Vec::with_capacity(pack.biows.len());
    for w in pack.biows.drain(..) {
        if is_failed || w.error().is_some() {
            if !dev.state.is_read_only() {
                tracing::error!(
                    name = %dev.name,
                    pos_lb = w.pos_lb,
                    "log IO failed; device becomes read-only"
                );
            }
            is_failed = true;
            dev.state.set_read_only();
            let error = w.error().unwrap_or(IoError::Io);
            w.completion.complete(Err(error));
            w.done.complete(Err(error));
            dev.retire_wrapper(&w);
            continue;
        }

        if w.is_zero_flush() {
            debug_assert!(pack.is_zero_flush_only);
            w.completion.complete(Ok(()));
            w.done.complete(Ok(()));
            dev.retire_wrapper(&w);
            continue;
        }

        // Track the write as pending so reads see it, and decide
        // backpressure with the pre-insert total.
        let is_stop = {
            let mut pending = dev.pending.lock().unwrap_or_else(|e| e.into_inner());
            let is_stop = !pending.under_throttle
                && pending.index.pending_sectors() + u64::from(w.len_lb)
                    > dev.params.max_pending_sectors();
            if is_stop {
                pending.under_throttle = true;
                pending.restart_deadline = dev.clock.now() + dev.params.queue_stop_timeout();
            }
            if w.is_discard() {
                // Discards carry no buffer; account metadata only.
                pending.index.add_sectors(1);
            } else {
                pending.index.add_sectors(u64::from(w.len_lb));
                pending.index.insert(&w);
            }
            is_stop
        };
        if is_stop && dev.state.n_stoppers.fetch_add(1, Ordering::AcqRel) == 0 {
            tracing::debug!(name = %dev.name, "iocore frozen by pending-data backpressure");
        }

        // Fast path acknowledgement: the log holds the write.
        w.completion.complete(Ok(()));
        w.set_state(STATE_PREPARED);
        {
            let mut queue = dev
                .queues
                .data_submit
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            queue.push_back(Arc::clone(&w));
        }
        kept.push(w);
    }
    pack.biows = kept;

    if !is_failed {
        let next = pack.header.next_lsid();
        let mut should_notice = false;
        {
            let mut track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            track.lsids.completed = next;
            if pack.is_flush_contained && track.lsids.permanent < logpack_lsid {
                let was_empty = track.lsids.is_permanent_log_empty();
                track.lsids.permanent = logpack_lsid;
                should_notice |= was_empty && !track.lsids.is_permanent_log_empty();
            }
            if !dev.ldev.supports_flush() && track.lsids.permanent < next {
                // Flush-incapable log device: completion is the best
                // durability there is.
                let was_empty = track.lsids.is_permanent_log_empty();
                track.lsids.flush = track.lsids.flush.max(next);
                track.lsids.permanent = next;
                should_notice |= was_empty && !track.lsids.is_permanent_log_empty();
            }
            debug_assert!(track.lsids.permanent <= track.lsids.completed);
        }
        if should_notice {
            dev.events.publish(LsidEvent::PermanentLogNonEmpty);
        }
    }
}
