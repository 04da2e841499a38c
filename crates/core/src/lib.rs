// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walb-core: On-disk format types and shared primitives for WalB
//!
//! WalB is a block-level write-ahead log that sits between an upper block
//! client and two block devices: a log device (LDEV) holding an ordered
//! stream of logpacks and a data device (DDEV) holding the authoritative
//! contents. This crate defines the pieces every other walb crate needs:
//! block-size math, the salted checksum, the lsid watermark set, the
//! logpack and superblock codecs, device parameters, and the clock and
//! rate-limit helpers used by the pipeline.
//!
//! All on-disk integers are native-endian by design; the encoding goes
//! through [`codec`] so an endian-portable variant would be a single
//! change.

pub mod block;
pub mod checksum;
pub mod clock;
pub mod codec;
pub mod error;
pub mod logpack;
pub mod lsid;
pub mod param;
pub mod ratelimit;
pub mod superblock;

pub use block::{addr_lb, addr_pb, capacity_pb, is_valid_pbs, n_lb_in_pb, LOGICAL_BLOCK_SIZE};
pub use checksum::checksum;
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{FormatError, ParamError};
pub use logpack::{LogRecord, LogpackHeader};
pub use lsid::{Lsids, INVALID_LSID};
pub use param::{DeviceParams, DiscardPolicy, Tunables};
pub use ratelimit::RateLimit;
pub use superblock::Superblock;
