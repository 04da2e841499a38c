// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The checkpoint worker
//!
//! Periodically persists `{oldest_lsid, written_lsid}` into the
//! superblock so recovery starts close to the front. A checkpoint is
//! skipped while `written` has not moved since the last one.
//! `is_sync_superblock = false` skips the fsync after the write (test
//! switch; never relied on for correctness).

use crate::device::DeviceInner;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use walb_bdev::{write_superblock, FormatLdevError};

const POLL: Duration = Duration::from_millis(50);

pub(crate) fn spawn(dev: &Arc<DeviceInner>) -> std::io::Result<JoinHandle<()>> {
    let worker = Arc::clone(dev);
    std::thread::Builder::new()
        .name(format!("walb-checkpoint/{}", dev.minor))
        .spawn(move || run(&worker))
}

fn run(dev: &Arc<DeviceInner>) {
    let mut last = dev.clock.now();
    loop {
        if dev.shutdown.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(POLL);

        let interval = Duration::from_millis(dev.checkpoint_interval_ms.load(Ordering::Acquire));
        if dev.clock.now().duration_since(last) < interval {
            continue;
        }
        last = dev.clock.now();

        if let Err(e) = take_checkpoint(dev) {
            tracing::error!(
                name = %dev.name,
                error = %e,
                "checkpoint failed; device becomes read-only"
            );
            dev.state.set_read_only();
        }
    }
}

/// Persist the current oldest/written watermarks. Returns false when
/// nothing moved and the write was skipped.
pub(crate) fn take_checkpoint(dev: &Arc<DeviceInner>) -> Result<bool, FormatLdevError> {
    let (oldest, written, unchanged) = {
        let track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
        (
            track.lsids.oldest,
            track.lsids.written,
            track.lsids.written == track.lsids.prev_written,
        )
    };
    if unchanged {
        return Ok(false);
    }

    let sb = {
        let mut sb = dev.superblock.lock().unwrap_or_else(|e| e.into_inner());
        sb.oldest_lsid = oldest;
        sb.written_lsid = written;
        sb.clone()
    };
    write_superblock(dev.ldev.as_ref(), &sb, dev.tunables.is_sync_superblock)?;

    {
        let mut track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
        track.lsids.prev_written = written;
    }
    tracing::debug!(name = %dev.name, oldest, written, "checkpoint taken");
    Ok(true)
}
