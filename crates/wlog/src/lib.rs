// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walb-wlog: log stream tooling
//!
//! The extractable window of a device is `[oldest, permanent)`. This
//! crate reads logpacks straight off an LDEV ring ([`ring::RingReader`]),
//! copies them into portable wlog files ([`extract`]), and replays wlog
//! files — or the ring itself, during crash recovery — onto a data
//! device ([`replay`]). Replay stops at the first invalid header or
//! record and is idempotent.

pub mod error;
pub mod extract;
pub mod file;
pub mod replay;
pub mod ring;

pub use error::WlogError;
pub use extract::{extract, ExtractSummary};
pub use file::{WlogFileHeader, WlogReader, WlogWriter};
pub use replay::{apply_pack, replay_file, ReplaySummary};
pub use ring::{PackData, RingReader};
