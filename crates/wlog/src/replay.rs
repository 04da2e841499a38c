// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replaying a log stream onto a data device
//!
//! Records are applied in lsid order: normal records write their payload
//! at `offset_lb`, padding records are skipped, discard records follow
//! the configured [`DiscardPolicy`] when the target has no discard
//! support. Replaying the same stream twice is idempotent.

use crate::error::WlogError;
use crate::file::WlogReader;
use crate::ring::PackData;
use std::path::Path;
use walb_bdev::Bdev;
use walb_core::DiscardPolicy;

#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaySummary {
    pub n_packs: u64,
    pub n_records: u64,
    pub n_discards: u64,
    pub end_lsid: u64,
}

/// Apply one pack's records to `ddev`.
pub fn apply_pack(
    ddev: &dyn Bdev,
    pack: &PackData,
    policy: DiscardPolicy,
) -> Result<(u64, u64), WlogError> {
    let mut n_records = 0u64;
    let mut n_discards = 0u64;
    for (i, rec) in pack.header.records().iter().enumerate() {
        if rec.is_padding() {
            continue;
        }
        if rec.is_discard() {
            n_discards += 1;
            if ddev.supports_discard() {
                ddev.discard(rec.offset_lb, u32::from(rec.io_size_lb))?;
            } else {
                match policy {
                    DiscardPolicy::Elide => {}
                    DiscardPolicy::LogOnly => {
                        tracing::debug!(
                            lsid = rec.lsid,
                            offset_lb = rec.offset_lb,
                            io_size_lb = rec.io_size_lb,
                            "discard without device support; metadata-only no-op"
                        );
                    }
                }
            }
            continue;
        }
        ddev.write_at(rec.offset_lb, pack.record_data(i))?;
        n_records += 1;
    }
    Ok((n_records, n_discards))
}

/// Replay a wlog file onto `ddev`. Stops at the first invalid header or
/// record; everything before the stop point has been applied.
pub fn replay_file(
    wlog: &Path,
    ddev: &dyn Bdev,
    policy: DiscardPolicy,
) -> Result<ReplaySummary, WlogError> {
    let mut reader = WlogReader::open(wlog)?;
    let mut summary = ReplaySummary {
        end_lsid: reader.header().begin_lsid,
        ..ReplaySummary::default()
    };

    while let Some(pack) = reader.next_pack()? {
        let (n_records, n_discards) = apply_pack(ddev, &pack, policy)?;
        summary.n_packs += 1;
        summary.n_records += n_records;
        summary.n_discards += n_discards;
        summary.end_lsid = pack.header.next_lsid();
    }
    ddev.flush()?;

    tracing::info!(
        n_packs = summary.n_packs,
        end = summary.end_lsid,
        "replayed wlog"
    );
    Ok(summary)
}
