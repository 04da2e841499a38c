// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submit-log stage: the pack builder and log submitter
//!
//! Dequeues a bounded batch of write wrappers, groups them into packs
//! (assigning lsids), decides flush headers, detects ring overflow, and
//! writes each pack's header and payload to the LDEV ring. Built packs
//! move to the log-wait queue.

use crate::device::{enqueue_wait_log_task, DeviceInner};
use crate::error::IoError;
use crate::hook::invoke_userland_exec;
use crate::pack::Pack;
use crate::state::{STATE_LOG_OVERFLOW, STATE_SUBMIT_LOG_WORKING};
use crate::wrapper::{BioWrapper, STATE_STARTED};
use std::sync::Arc;
use walb_core::capacity_pb;

pub(crate) fn task(dev: &Arc<DeviceInner>) {
    loop {
        let batch: Vec<Arc<BioWrapper>> = {
            let mut queue = dev
                .queues
                .log_submit
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if queue.is_empty() {
                dev.state.clear(STATE_SUBMIT_LOG_WORKING);
                break;
            }
            let n = queue.len().min(dev.params.n_io_bulk);
            let batch: Vec<_> = queue.drain(..n).collect();
            for w in &batch {
                w.set_state(STATE_STARTED);
                dev.state
                    .n_started_write_bio
                    .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            }
            batch
        };

        if dev.state.is_read_only() {
            fail_wrapper_list(dev, batch, IoError::ReadOnly);
            continue;
        }

        let Some(mut packs) = create_logpack_list(dev, batch) else {
            continue;
        };
        submit_logpack_list(dev, &mut packs);

        {
            let mut queue = dev.queues.log_wait.lock().unwrap_or_else(|e| e.into_inner());
            for pack in packs {
                queue.push_back(pack);
            }
        }
        enqueue_wait_log_task(dev);
    }
}

/// Fail every wrapper in the list and retire it.
pub(crate) fn fail_wrapper_list(
    dev: &Arc<DeviceInner>,
    wrappers: Vec<Arc<BioWrapper>>,
    error: IoError,
) {
    for w in wrappers {
        w.set_error(error);
        w.completion.complete(Err(error));
        w.done.complete(Err(error));
        dev.retire_wrapper(&w);
    }
}

/// Group a batch of wrappers into packs, assign lsids, decide the flush
/// header, and update the watermarks. Returns `None` when the batch was
/// failed to prevent ring overflow.
fn create_logpack_list(dev: &Arc<DeviceInner>, batch: Vec<Arc<BioWrapper>>) -> Option<Vec<Pack>> {
    let (mut latest, oldest, written, mut flush_lsid, mut flush_deadline) = {
        let track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
        (
            track.lsids.latest,
            track.lsids.oldest,
            track.lsids.written,
            track.lsids.flush,
            track.log_flush_deadline,
        )
    };
    let latest_old = latest;
    debug_assert!(latest >= written);

    let mut packs: Vec<Pack> = Vec::new();
    let mut current: Option<Pack> = None;
    for w in batch {
        writepack_add(
            dev,
            &mut packs,
            &mut current,
            w,
            &mut latest,
            &mut flush_lsid,
            &mut flush_deadline,
        );
    }
    if let Some(mut pack) = current.take() {
        pack.check_and_set_zero_flush();
        debug_assert!(pack.is_prepared_valid());
        latest = pack.header.next_lsid();

        // Decide whether this pack's header must carry flush semantics.
        let interval_pb = dev.params.log_flush_interval_pb(dev.pbs);
        let is_flush_size = interval_pb > 0 && latest - flush_lsid > interval_pb;
        let is_flush_period =
            dev.params.log_flush_interval_ms > 0 && flush_deadline < dev.clock.now();
        if is_flush_size || is_flush_period {
            pack.is_flush_header = true;
            flush_lsid = pack.header.logpack_lsid;
        }
        packs.push(pack);
    }
    if packs.is_empty() {
        return None;
    }

    // Refuse the batch rather than overwrite unconsumed log.
    if dev.tunables.is_error_before_overflow && dev.ring_buffer_size < latest - oldest {
        for pack in packs {
            fail_wrapper_list(dev, pack.biows, IoError::Overflow);
        }
        dev.state.set(STATE_LOG_OVERFLOW);
        return None;
    }

    {
        let mut track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert_eq!(track.lsids.latest, latest_old);
        debug_assert!(latest >= latest_old);
        track.lsids.latest = latest;
        if track.lsids.flush < flush_lsid {
            track.lsids.flush = flush_lsid;
            track.log_flush_deadline = dev.clock.now() + dev.params.log_flush_interval();
        }
    }

    if latest - oldest > dev.ring_buffer_size {
        if dev.state.test_and_set(STATE_LOG_OVERFLOW) {
            if dev.overflow_warn.check(dev.clock.as_ref()) {
                tracing::warn!(
                    name = %dev.name,
                    "ring buffer for log has been overflowed; reset-wal is required"
                );
            }
            invoke_userland_exec(&dev.tunables, dev.minor, "overflow");
        }
    }

    if latest - written > dev.ring_buffer_size && dev.consistency_warn.check(dev.clock.as_ref()) {
        tracing::error!(
            name = %dev.name,
            latest,
            written,
            ring_buffer_pb = dev.ring_buffer_size,
            "ring buffer too small to keep consistency; grow the log device"
        );
    }

    Some(packs)
}

/// Add one wrapper to the open pack, sealing and opening packs as the
/// boundary rules require.
fn writepack_add(
    dev: &Arc<DeviceInner>,
    packs: &mut Vec<Pack>,
    current: &mut Option<Pack>,
    w: Arc<BioWrapper>,
    latest: &mut u64,
    flush_lsid: &mut u64,
    flush_deadline: &mut std::time::Instant,
) {
    let max_logpack_pb = dev.params.max_logpack_pb(dev.pbs);

    let mut added = false;
    if let Some(pack) = current.as_mut() {
        let must_seal = pack.is_zero_flush()
            || (pack.header.n_records() > 0
                && (w.is_flush || is_pack_size_too_large(pack, dev.pbs, max_logpack_pb, &w)));
        if !must_seal && !w.is_zero_flush() {
            if let Some(lsid) =
                pack.header
                    .try_add(w.pos_lb, w.len_lb, w.is_discard(), dev.ring_buffer_size)
            {
                w.set_lsid(lsid);
                added = true;
            }
        }
    }

    if !added {
        if let Some(mut sealed) = current.take() {
            sealed.check_and_set_zero_flush();
            debug_assert!(sealed.is_prepared_valid());
            *latest = sealed.header.next_lsid();
            packs.push(sealed);
        }

        let mut pack = Pack::new(dev.pbs, *latest);
        if !w.is_zero_flush() {
            match pack
                .header
                .try_add(w.pos_lb, w.len_lb, w.is_discard(), dev.ring_buffer_size)
            {
                Some(lsid) => w.set_lsid(lsid),
                None => {
                    // A single I/O always fits an empty header; reaching
                    // this means the request exceeds the format limits.
                    tracing::error!(
                        pos_lb = w.pos_lb,
                        len_lb = w.len_lb,
                        "write exceeds logpack limits"
                    );
                    fail_wrapper_list(dev, vec![w], IoError::Io);
                    return;
                }
            }
        }
        *current = Some(pack);
    }

    let pack = match current.as_mut() {
        Some(pack) => pack,
        None => return,
    };
    pack.biows.push(Arc::clone(&w));
    if w.is_flush {
        pack.is_flush_contained = true;
        *flush_lsid = if pack.header.n_records() > 0 && !w.is_discard() {
            w.lsid()
        } else {
            *latest
        };
        *flush_deadline = dev.clock.now() + dev.params.log_flush_interval();
    }
}

fn is_pack_size_too_large(pack: &Pack, pbs: u32, max_logpack_pb: u32, w: &BioWrapper) -> bool {
    if max_logpack_pb == 0 {
        return false;
    }
    capacity_pb(pbs, w.len_lb) + u32::from(pack.header.total_io_size) > max_logpack_pb
}

/// Write every pack to the LDEV: header block first (flushing ahead of
/// it when the pack carries a flush header), then one payload write per
/// record. Errors mark the pack failed; the wait stage demotes the
/// device.
fn submit_logpack_list(dev: &Arc<DeviceInner>, packs: &mut [Pack]) {
    let salt = dev.salt();
    for pack in packs.iter_mut() {
        if pack.is_zero_flush_only {
            debug_assert_eq!(pack.header.n_records(), 0);
            if let Err(e) = dev.ldev.flush() {
                tracing::error!(error = %e, "LDEV flush failed");
                pack.is_logpack_failed = true;
            }
            continue;
        }

        logpack_calc_checksum(pack, salt);
        if let Err(e) = submit_logpack(dev, pack) {
            tracing::error!(
                lsid = pack.header.logpack_lsid,
                error = %e,
                "logpack submission failed"
            );
            pack.is_logpack_failed = true;
        }
    }
}

/// Fill in record checksums from the wrappers and seal the header
/// checksum with the device salt.
fn logpack_calc_checksum(pack: &mut Pack, salt: u32) {
    let mut i = 0usize;
    for w in &pack.biows {
        if pack.header.records()[i].is_padding() {
            i += 1;
            debug_assert!(i < pack.header.records().len());
        }
        debug_assert!(!w.is_zero_flush());
        pack.header.records_mut()[i].checksum = w.csum;
        i += 1;
    }
    debug_assert_eq!(i, pack.header.records().len());
    pack.header.finalize_checksum(salt);
}

fn submit_logpack(dev: &Arc<DeviceInner>, pack: &Pack) -> Result<(), walb_bdev::BdevError> {
    // Flush semantics on the header: all prior log IO becomes durable
    // before the header lands.
    if pack.is_flush_header {
        dev.ldev.flush()?;
    }

    let mut header_block = vec![0u8; dev.pbs as usize];
    pack.header.encode(&mut header_block);
    dev.ldev_write_pb(pack.header.logpack_lsid, &header_block)?;

    let mut i = 0usize;
    for w in &pack.biows {
        let mut rec = pack.header.records()[i];
        if rec.is_padding() {
            i += 1;
            rec = pack.header.records()[i];
        }
        i += 1;

        if rec.is_discard() {
            // Discard payload never touches the LDEV.
            continue;
        }

        // IO persistence requires all prior log-IO persistence.
        if w.is_fua {
            dev.ldev.flush()?;
        }

        let data = match w.data() {
            Some(data) => data,
            None => continue,
        };
        let n_pb = capacity_pb(dev.pbs, w.len_lb) as usize;
        let mut padded = vec![0u8; n_pb * dev.pbs as usize];
        padded[..data.len()].copy_from_slice(data);
        dev.ldev_write_pb(rec.lsid, &padded)?;
    }
    Ok(())
}
