// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copying a lsid window off the ring into a wlog file

use crate::error::WlogError;
use crate::file::{WlogFileHeader, WlogWriter};
use crate::ring::RingReader;
use std::path::Path;
use walb_bdev::Bdev;
use walb_core::Superblock;

#[derive(Clone, Copy, Debug)]
pub struct ExtractSummary {
    pub begin_lsid: u64,
    pub end_lsid: u64,
    pub n_packs: u64,
}

/// Copy logpacks with lsids in `[lsid0, lsid1)` into a wlog file.
///
/// On a live device, callers must bound `lsid1` by the permanent lsid;
/// log beyond it may not be durable yet. Stops with an error at the
/// first invalid pack.
pub fn extract(
    ldev: &dyn Bdev,
    sb: &Superblock,
    lsid0: u64,
    lsid1: u64,
    out: &Path,
) -> Result<ExtractSummary, WlogError> {
    let mut writer = WlogWriter::create(out, WlogFileHeader::new(sb, lsid0))?;
    let mut reader = RingReader::new(ldev, sb, lsid0, lsid1);

    while let Some(pack) = reader.next_pack()? {
        writer.append_pack(&pack)?;
    }
    let n_packs = writer.n_packs();
    let header = writer.finish()?;

    tracing::info!(
        begin = header.begin_lsid,
        end = header.end_lsid,
        n_packs,
        "extracted wlog"
    );
    Ok(ExtractSummary {
        begin_lsid: header.begin_lsid,
        end_lsid: header.end_lsid,
        n_packs,
    })
}
