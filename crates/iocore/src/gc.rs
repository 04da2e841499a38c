// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The GC worker
//!
//! A dedicated per-device thread that collects finished packs: waits for
//! each member's data completion (with a periodic timeout that only
//! detects stuck devices; the underlying device owns its retries),
//! advances the `written` watermark, and frees pack resources. Bounded
//! by `n_pack_bulk` per round.

use crate::device::DeviceInner;
use crate::pack::Pack;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long to wait for one data completion before logging.
pub(crate) const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

const IDLE_WAIT: Duration = Duration::from_millis(100);

pub(crate) fn spawn(dev: &Arc<DeviceInner>) -> std::io::Result<JoinHandle<()>> {
    let worker = Arc::clone(dev);
    std::thread::Builder::new()
        .name(format!("walb-gc/{}", dev.minor))
        .spawn(move || run(&worker))
}

fn run(dev: &Arc<DeviceInner>) {
    loop {
        let batch: Vec<Pack> = {
            let mut queue = dev.queues.gc.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if !queue.is_empty() {
                    break;
                }
                if dev.shutdown.load(Ordering::Acquire) {
                    return;
                }
                let (guard, _) = dev
                    .queues
                    .gc_cond
                    .wait_timeout(queue, IDLE_WAIT)
                    .unwrap_or_else(|e| e.into_inner());
                queue = guard;
            }
            let n = queue.len().min(dev.params.n_pack_bulk);
            queue.drain(..n).collect()
        };
        gc_logpack_list(dev, batch);
    }
}

fn gc_logpack_list(dev: &Arc<DeviceInner>, packs: Vec<Pack>) {
    let n_packs = packs.len();
    let mut written = None;

    for pack in packs {
        for w in &pack.biows {
            let mut attempts = 0u32;
            loop {
                match w.done.wait_timeout(COMPLETION_TIMEOUT) {
                    Some(Ok(())) => break,
                    Some(Err(e)) => {
                        tracing::error!(
                            name = %dev.name,
                            pos_lb = w.pos_lb,
                            error = %e,
                            "data IO failed during GC"
                        );
                        break;
                    }
                    None => {
                        attempts += 1;
                        tracing::warn!(
                            name = %dev.name,
                            attempts,
                            pos_lb = w.pos_lb,
                            len_lb = w.len_lb,
                            "data IO completion timeout; still waiting"
                        );
                    }
                }
            }
            dev.retire_wrapper(w);
        }
        written = Some(pack.header.next_lsid());
    }

    if let Some(written) = written {
        let mut track = dev.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
        if track.lsids.written < written {
            track.lsids.written = written;
        }
    }
    dev.state.n_pending_gc.fetch_sub(n_packs, Ordering::AcqRel);
}
