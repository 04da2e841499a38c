// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `walbctl status`

use crate::commands::{format::hex, open_image};
use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use walb_bdev::read_superblock;

#[derive(Args)]
pub struct StatusArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
}

#[derive(Serialize)]
struct StatusReport {
    name: String,
    uuid: String,
    physical_bs: u32,
    device_size_lb: u64,
    log_capacity_pb: u64,
    log_usage_pb: u64,
    oldest_lsid: u64,
    written_lsid: u64,
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name:            {}", self.name)?;
        writeln!(f, "uuid:            {}", self.uuid)?;
        writeln!(f, "physical_bs:     {}", self.physical_bs)?;
        writeln!(f, "device_size_lb:  {}", self.device_size_lb)?;
        writeln!(f, "log_capacity_pb: {}", self.log_capacity_pb)?;
        writeln!(f, "log_usage_pb:    {}", self.log_usage_pb)?;
        writeln!(f, "oldest_lsid:     {}", self.oldest_lsid)?;
        write!(f, "written_lsid:    {}", self.written_lsid)
    }
}

pub fn handle(args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ldev = open_image(&args.ldev)?;
    let sb = read_superblock(&ldev).context("reading superblock")?;

    output::print(
        &StatusReport {
            name: sb.name.clone(),
            uuid: hex(&sb.uuid),
            physical_bs: sb.physical_bs,
            device_size_lb: sb.device_size_lb,
            log_capacity_pb: sb.ring_buffer_size,
            log_usage_pb: sb.written_lsid - sb.oldest_lsid,
            oldest_lsid: sb.oldest_lsid,
            written_lsid: sb.written_lsid,
        },
        format,
    );
    Ok(())
}
