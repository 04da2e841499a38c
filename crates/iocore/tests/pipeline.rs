// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end pipeline scenarios: write path, read-through, overlap
//! serialization, extraction and recovery

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walb_bdev::{read_superblock, write_superblock, MemBdev};
use walb_core::{DeviceParams, DiscardPolicy, Tunables};
use walb_iocore::{WalbDevice, WriteFlags};
use walb_wlog::{extract, replay_file};

#[test]
fn sequential_write_then_extract_replay_identity() {
    let device_size_lb = 256 * 16;
    let fx = open_device(2048, device_size_lb, DeviceParams::default(), Tunables::default());

    // 256 sequential writes of 8 KiB.
    let mut handles = Vec::new();
    for i in 0..256u64 {
        let data = fill((i % 251) as u8 + 1, 16);
        handles.push(fx.dev.write(i * 16, &data, WriteFlags::default()).unwrap());
    }
    for h in &handles {
        h.wait().unwrap();
    }
    wait_drained(&fx.dev);

    let lsids = fx.dev.lsids();
    assert!(lsids.is_valid());
    assert_eq!(lsids.written, lsids.latest);
    assert_eq!(fx.dev.log_usage(), lsids.latest);
    assert_eq!(fx.dev.log_capacity(), 2048);

    // All bytes visible through the device.
    for i in 0..256u64 {
        let got = fx.dev.read(i * 16, 16).unwrap();
        assert_eq!(got, fill((i % 251) as u8 + 1, 16));
    }

    let expected = fx.ddev.snapshot();
    fx.dev.close().unwrap();

    // Extract the whole window and replay it onto a zeroed device.
    let dir = TempDir::new().unwrap();
    let wlog = dir.path().join("seq.wlog");
    let sb = read_superblock(fx.ldev.as_ref()).unwrap();
    assert_eq!(sb.written_lsid, lsids.latest); // final checkpoint
    let summary = extract(fx.ldev.as_ref(), &sb, 0, sb.written_lsid, &wlog).unwrap();
    assert_eq!(summary.end_lsid, sb.written_lsid);

    let fresh = MemBdev::new(device_size_lb);
    replay_file(&wlog, &fresh, DiscardPolicy::Elide).unwrap();
    assert_eq!(fresh.snapshot(), expected);
}

#[test]
fn read_returns_pending_bytes_before_data_completion() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());
    fx.ddev.set_write_delay(Duration::from_millis(100));

    let h = fx.dev.write(100, &fill(0xAB, 8), WriteFlags::default()).unwrap();
    // The fast acknowledgement arrives once the logpack is complete,
    // before the (delayed) data-device write finishes.
    h.wait().unwrap();

    let got = fx.dev.read(100, 8).unwrap();
    assert_eq!(got, fill(0xAB, 8));

    fx.ddev.set_write_delay(Duration::ZERO);
    h.wait_data().unwrap();
    // Still the same bytes once the data device has them.
    assert_eq!(fx.dev.read(100, 8).unwrap(), fill(0xAB, 8));
}

#[test]
fn overlapping_writes_serialize_and_last_wins() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());
    fx.ddev.set_write_delay(Duration::from_millis(50));

    let h1 = fx.dev.write(64, &fill(0x01, 8), WriteFlags::default()).unwrap();
    let h2 = fx.dev.write(64, &fill(0x02, 8), WriteFlags::default()).unwrap();

    h1.wait_data().unwrap();
    h2.wait_data().unwrap();
    fx.ddev.set_write_delay(Duration::ZERO);
    wait_drained(&fx.dev);

    // The second write's payload is authoritative.
    assert_eq!(fx.dev.read(64, 8).unwrap(), fill(0x02, 8));
    let off = 64 * 512;
    assert_eq!(&fx.ddev.snapshot()[off..off + 8 * 512], &fill(0x02, 8)[..]);
}

#[test]
fn mixed_overlapping_batch_keeps_read_law() {
    let fx = open_device(512, 4096, DeviceParams::default(), Tunables::default());
    fx.ddev.set_write_delay(Duration::from_millis(10));

    let mut handles = Vec::new();
    let writes: &[(u64, u32, u8)] = &[
        (0, 16, 0x11),
        (8, 16, 0x22),
        (4, 4, 0x33),
        (0, 8, 0x44),
        (20, 8, 0x55),
    ];
    for (pos, len, byte) in writes {
        handles.push(
            fx.dev
                .write(*pos, &fill(*byte, *len as usize), WriteFlags::default())
                .unwrap(),
        );
    }
    for h in &handles {
        h.wait_data().unwrap();
    }
    fx.ddev.set_write_delay(Duration::ZERO);
    wait_drained(&fx.dev);

    // Sequential model of the same writes.
    let mut model = vec![0u8; 28 * 512];
    for (pos, len, byte) in writes {
        let from = *pos as usize * 512;
        model[from..from + *len as usize * 512].fill(*byte);
    }
    assert_eq!(fx.dev.read(0, 28).unwrap(), model);
}

#[test]
fn zero_length_flush_advances_permanent_only() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());

    let h = fx.dev.write(0, &fill(0x7E, 8), WriteFlags::default()).unwrap();
    h.wait().unwrap();

    let before = fx.dev.lsids().latest;
    let flush = fx.dev.flush().unwrap();
    flush.wait().unwrap();

    poll_until("permanent to reach latest", || {
        let lsids = fx.dev.lsids();
        lsids.permanent == lsids.latest
    });
    // A zero flush consumes no log space.
    assert_eq!(fx.dev.lsids().latest, before);
    wait_drained(&fx.dev);

    let ddev_writes = fx
        .ddev
        .journal()
        .iter()
        .filter(|e| matches!(e, walb_bdev::MemEvent::Write { .. }))
        .count();
    assert_eq!(ddev_writes, 1); // the data write; the flush never reached DDEV
}

#[test]
fn discard_is_logged_and_applied() {
    let ticket = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let ldev = Arc::new(MemBdev::new((256 + HEADER_PB) * LB_PER_PB).with_ticket(Arc::clone(&ticket)));
    let ddev = Arc::new(MemBdev::new(4096).with_ticket(ticket).with_discard_support(true));
    walb_bdev::format_ldev(ldev.as_ref(), PBS, "disc", 4096).unwrap();
    let dev = WalbDevice::open(
        Arc::clone(&ldev) as Arc<dyn walb_bdev::Bdev>,
        Arc::clone(&ddev) as Arc<dyn walb_bdev::Bdev>,
        0,
        DeviceParams::default(),
        Tunables::default(),
    )
    .unwrap();

    dev.write(0, &fill(0xFF, 16), WriteFlags::default())
        .unwrap()
        .wait_data()
        .unwrap();
    dev.discard(0, 8).unwrap().wait_data().unwrap();
    wait_drained(&dev);

    assert_eq!(dev.read(0, 8).unwrap(), fill(0x00, 8));
    assert_eq!(dev.read(8, 8).unwrap(), fill(0xFF, 8));
    dev.close().unwrap();
}

#[test]
fn open_replays_log_beyond_checkpoint() {
    let fx = open_device(512, 4096, DeviceParams::default(), Tunables::default());

    for i in 0..8u64 {
        fx.dev
            .write(i * 32, &fill(i as u8 + 1, 32), WriteFlags::default())
            .unwrap()
            .wait()
            .unwrap();
    }
    wait_drained(&fx.dev);
    let expected = fx.ddev.snapshot();
    let end = fx.dev.lsids().latest;
    fx.dev.close().unwrap();

    // Simulate a crash that lost every data-device write: rewind the
    // checkpoint and present an empty data device.
    let mut sb = read_superblock(fx.ldev.as_ref()).unwrap();
    sb.oldest_lsid = 0;
    sb.written_lsid = 0;
    write_superblock(fx.ldev.as_ref(), &sb, true).unwrap();

    let fresh_ddev = Arc::new(MemBdev::new(4096));
    let dev = WalbDevice::open(
        Arc::clone(&fx.ldev) as Arc<dyn walb_bdev::Bdev>,
        Arc::clone(&fresh_ddev) as Arc<dyn walb_bdev::Bdev>,
        0,
        DeviceParams::default(),
        Tunables::default(),
    )
    .unwrap();

    let lsids = dev.lsids();
    assert_eq!(lsids.written, end);
    assert_eq!(fresh_ddev.snapshot(), expected);
    dev.close().unwrap();
}
