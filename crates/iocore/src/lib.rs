// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! walb-iocore: the WalB I/O pipeline
//!
//! Every write accepted by a [`WalbDevice`] is first recorded as a
//! logpack on the log device, then applied to the data device, under
//! four guarantees:
//!
//! 1. a data block is never submitted before its logpack is permanent;
//! 2. reads see the latest accepted bytes across the in-flight window
//!    (the pending index patches them in);
//! 3. overlapping data writes reach the data device in submission
//!    order (the overlap serializer delays successors);
//! 4. pending data is bounded: submission freezes past
//!    `max_pending_mb` and thaws at `min_pending_mb` or on timeout.
//!
//! The pipeline runs as four single-runner stages (submit-log,
//! wait-log, submit-data, wait-data) scheduled on demand, plus a
//! dedicated GC worker advancing the `written` watermark and a
//! checkpoint worker persisting it.

mod checkpoint;
mod device;
mod error;
mod gc;
mod hook;
mod notify;
mod overlap;
mod pack;
mod pending;
mod queues;
mod state;
mod submit_data;
mod submit_log;
mod wait_data;
mod wait_log;
mod wrapper;

pub use device::{WalbDevice, WriteFlags};
pub use error::{IoCoreError, IoError};
pub use notify::LsidEvent;
pub use wrapper::IoHandle;
