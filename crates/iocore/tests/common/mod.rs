// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};
use walb_bdev::{format_ldev, MemBdev};
use walb_core::{DeviceParams, Tunables};
use walb_iocore::WalbDevice;

pub const PBS: u32 = 4096;
pub const LB_PER_PB: u64 = 8;
/// Physical blocks in front of the ring (reserved + sb0 + metadata + sb1).
pub const HEADER_PB: u64 = 11;

pub struct Fixture {
    pub ldev: Arc<MemBdev>,
    pub ddev: Arc<MemBdev>,
    pub dev: WalbDevice,
}

/// Format a fresh pair of in-memory devices (sharing one event ticket)
/// and open a walb device over them.
pub fn open_device(
    ring_pb: u64,
    device_size_lb: u64,
    params: DeviceParams,
    tunables: Tunables,
) -> Fixture {
    let ticket = Arc::new(AtomicU64::new(0));
    let ldev = Arc::new(MemBdev::new((ring_pb + HEADER_PB) * LB_PER_PB).with_ticket(Arc::clone(&ticket)));
    let ddev = Arc::new(MemBdev::new(device_size_lb).with_ticket(ticket));
    let sb = format_ldev(ldev.as_ref(), PBS, "itest", device_size_lb).unwrap();
    assert_eq!(sb.ring_buffer_size, ring_pb);

    let dev = WalbDevice::open(
        Arc::clone(&ldev) as Arc<dyn walb_bdev::Bdev>,
        Arc::clone(&ddev) as Arc<dyn walb_bdev::Bdev>,
        0,
        params,
        tunables,
    )
    .unwrap();
    Fixture { ldev, ddev, dev }
}

pub fn fill(byte: u8, len_lb: usize) -> Vec<u8> {
    vec![byte; len_lb * 512]
}

/// Poll until `cond` holds; panics after 10 seconds.
pub fn poll_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Wait until the written watermark catches up with latest (all
/// accepted writes fully applied and collected).
pub fn wait_drained(dev: &WalbDevice) {
    poll_until("written to reach latest", || {
        let lsids = dev.lsids();
        lsids.written == lsids.latest
    });
}
