//! CLI command implementations

pub mod device;
pub mod format;
pub mod log;
pub mod lsid;
pub mod status;

use anyhow::Context;
use std::path::Path;
use walb_bdev::FileBdev;

/// Open a device image file exclusively.
pub fn open_image(path: &Path) -> anyhow::Result<FileBdev> {
    FileBdev::open(path).with_context(|| format!("opening {}", path.display()))
}
