// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log stream commands: capacity/usage queries, `cat-wldev` and
//! `redo-wlog`

use crate::commands::open_image;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use walb_bdev::read_superblock;
use walb_core::DiscardPolicy;
use walb_wlog::{extract, replay_file};

#[derive(Args)]
pub struct GetLogCapacityArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
}

pub fn handle_capacity(args: GetLogCapacityArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;
    println!("{}", sb.ring_buffer_size);
    Ok(())
}

#[derive(Args)]
pub struct GetLogUsageArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
}

pub fn handle_usage(args: GetLogUsageArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;
    println!("{}", sb.written_lsid - sb.oldest_lsid);
    Ok(())
}

#[derive(Args)]
pub struct CatWldevArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
    /// First lsid of the window (default: the oldest checkpointed lsid)
    #[arg(long)]
    pub lsid0: Option<u64>,
    /// End of the window, exclusive (default: the written lsid)
    #[arg(long)]
    pub lsid1: Option<u64>,
    /// Output wlog file
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Serialize)]
struct ExtractReport {
    begin_lsid: u64,
    end_lsid: u64,
    n_packs: u64,
}

impl std::fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "extracted {} packs, lsids [{}, {})",
            self.n_packs, self.begin_lsid, self.end_lsid
        )
    }
}

pub fn handle_cat(args: CatWldevArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;
    let lsid0 = args.lsid0.unwrap_or(sb.oldest_lsid);
    let lsid1 = args.lsid1.unwrap_or(sb.written_lsid);
    if lsid0 < sb.oldest_lsid {
        bail!("lsid0 {} precedes the oldest retained lsid {}", lsid0, sb.oldest_lsid);
    }
    if lsid1 < lsid0 {
        bail!("empty window: lsid1 {} < lsid0 {}", lsid1, lsid0);
    }

    let summary = extract(&ldev, &sb, lsid0, lsid1, &args.out)
        .with_context(|| format!("extracting to {}", args.out.display()))?;
    output::print(
        &ExtractReport {
            begin_lsid: summary.begin_lsid,
            end_lsid: summary.end_lsid,
            n_packs: summary.n_packs,
        },
        format,
    );
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum DiscardMode {
    /// Silently skip discards the target cannot express
    #[default]
    Elide,
    /// Record them as metadata-only no-ops
    LogOnly,
}

#[derive(Args)]
pub struct RedoWlogArgs {
    /// Input wlog file
    #[arg(long)]
    pub wlog: PathBuf,
    /// Target data device image
    #[arg(long)]
    pub ddev: PathBuf,
    /// Handling of discard records without device support
    #[arg(long, value_enum, default_value = "elide")]
    pub discard: DiscardMode,
}

#[derive(Serialize)]
struct ReplayReport {
    n_packs: u64,
    n_records: u64,
    n_discards: u64,
    end_lsid: u64,
}

impl std::fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "replayed {} packs ({} records, {} discards) up to lsid {}",
            self.n_packs, self.n_records, self.n_discards, self.end_lsid
        )
    }
}

pub fn handle_redo(args: RedoWlogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ddev = open_image(&args.ddev)?;
    let policy = match args.discard {
        DiscardMode::Elide => DiscardPolicy::Elide,
        DiscardMode::LogOnly => DiscardPolicy::LogOnly,
    };
    let summary = replay_file(&args.wlog, &ddev, policy)
        .with_context(|| format!("replaying {}", args.wlog.display()))?;
    output::print(
        &ReplayReport {
            n_packs: summary.n_packs,
            n_records: summary.n_records,
            n_discards: summary.n_discards,
            end_lsid: summary.end_lsid,
        },
        format,
    );
    Ok(())
}
