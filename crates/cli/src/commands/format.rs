// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `walbctl format-ldev`

use crate::commands::open_image;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use walb_bdev::{format_ldev, Bdev};

#[derive(Args)]
pub struct FormatLdevArgs {
    /// Log device image
    #[arg(long)]
    pub ldev: PathBuf,
    /// Data device image (determines the exposed device size)
    #[arg(long)]
    pub ddev: PathBuf,
    /// Device name stored in the superblock
    #[arg(long, default_value = "")]
    pub name: String,
    /// Physical block size (512 or 4096)
    #[arg(long, default_value_t = 4096)]
    pub pbs: u32,
}

#[derive(Serialize)]
struct FormatReport {
    name: String,
    uuid: String,
    physical_bs: u32,
    ring_buffer_pb: u64,
    device_size_lb: u64,
}

impl std::fmt::Display for FormatReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "name:           {}", self.name)?;
        writeln!(f, "uuid:           {}", self.uuid)?;
        writeln!(f, "physical_bs:    {}", self.physical_bs)?;
        writeln!(f, "ring_buffer_pb: {}", self.ring_buffer_pb)?;
        write!(f, "device_size_lb: {}", self.device_size_lb)
    }
}

pub fn handle(args: FormatLdevArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.name.len() >= walb_core::superblock::DEVICE_NAME_MAX {
        bail!("device name too long: {} bytes", args.name.len());
    }
    let ldev = open_image(&args.ldev)?;
    let ddev = open_image(&args.ddev)?;

    let sb = format_ldev(&ldev, args.pbs, &args.name, ddev.size_lb())
        .with_context(|| format!("formatting {}", args.ldev.display()))?;

    output::print(
        &FormatReport {
            name: sb.name.clone(),
            uuid: hex(&sb.uuid),
            physical_bs: sb.physical_bs,
            ring_buffer_pb: sb.ring_buffer_size,
            device_size_lb: sb.device_size_lb,
        },
        format,
    );
    Ok(())
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
