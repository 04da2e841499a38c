// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `walbctl get-lsid` / `walbctl set-oldest-lsid`

use crate::commands::open_image;
use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use walb_bdev::{read_superblock, write_superblock};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LsidKind {
    Oldest,
    Written,
}

#[derive(Args)]
pub struct GetLsidArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
    /// Which checkpointed watermark to print
    #[arg(long, value_enum)]
    pub kind: LsidKind,
}

pub fn handle_get(args: GetLsidArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;
    let lsid = match args.kind {
        LsidKind::Oldest => sb.oldest_lsid,
        LsidKind::Written => sb.written_lsid,
    };
    println!("{lsid}");
    Ok(())
}

#[derive(Args)]
pub struct SetOldestLsidArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
    /// New oldest lsid; must lie in [oldest, written]
    #[arg(long)]
    pub lsid: u64,
}

pub fn handle_set_oldest(args: SetOldestLsidArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let mut sb = read_superblock(&ldev).context("reading superblock")?;

    if args.lsid < sb.oldest_lsid || args.lsid > sb.written_lsid {
        bail!(
            "lsid {} outside [{}, {}]",
            args.lsid,
            sb.oldest_lsid,
            sb.written_lsid
        );
    }
    sb.oldest_lsid = args.lsid;
    write_superblock(&ldev, &sb, true).context("writing superblock")?;
    Ok(())
}
