// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device maintenance commands: `reset-wal`, `resize`,
//! `is-log-overflow`

use crate::commands::open_image;
use anyhow::{bail, Context};
use clap::Args;
use std::path::PathBuf;
use walb_bdev::{read_superblock, reset_wal, write_superblock, Bdev};

#[derive(Args)]
pub struct ResetWalArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
}

pub fn handle_reset_wal(args: ResetWalArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = reset_wal(&ldev).context("resetting WAL")?;
    println!("reset at lsid {}", sb.written_lsid);
    Ok(())
}

#[derive(Args)]
pub struct ResizeArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
    /// Data device image backing the new size
    #[arg(long)]
    pub ddev: PathBuf,
    /// New exposed size in logical blocks (default: the data device size)
    #[arg(long)]
    pub size_lb: Option<u64>,
}

pub fn handle_resize(args: ResizeArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let ddev = open_image(&args.ddev)?;
    let mut sb = read_superblock(&ldev).context("reading superblock")?;

    let new_size = args.size_lb.unwrap_or_else(|| ddev.size_lb());
    if new_size < sb.device_size_lb {
        bail!(
            "cannot shrink device from {} to {} blocks",
            sb.device_size_lb,
            new_size
        );
    }
    if new_size > ddev.size_lb() {
        bail!("data device has only {} blocks", ddev.size_lb());
    }

    sb.device_size_lb = new_size;
    write_superblock(&ldev, &sb, true).context("writing superblock")?;
    println!("resized to {new_size} blocks");
    Ok(())
}

#[derive(Args)]
pub struct IsLogOverflowArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
}

/// Reports the superblock view: the runtime overflow bit is not
/// persisted, so a consistently checkpointed image prints 0.
pub fn handle_is_log_overflow(args: IsLogOverflowArgs) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;
    let overflow = sb.written_lsid - sb.oldest_lsid > sb.ring_buffer_size;
    println!("{}", if overflow { 1 } else { 0 });
    Ok(())
}
