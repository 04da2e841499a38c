// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durability ordering and failure-demotion scenarios

mod common;

use common::*;
use walb_bdev::MemEvent;
use walb_core::{DeviceParams, Tunables};
use walb_iocore::{IoCoreError, IoError, WriteFlags};

#[test]
fn data_writes_never_precede_a_log_flush() {
    // Tight flush interval so flush headers appear every 8 pb.
    let params = DeviceParams {
        log_flush_interval_mb: 1,
        max_pending_mb: 2,
        min_pending_mb: 1,
        log_flush_interval_ms: 20,
        ..DeviceParams::default()
    };
    let fx = open_device(1024, 4096, params, Tunables::default());

    let mut handles = Vec::new();
    for i in 0..64u64 {
        handles.push(
            fx.dev
                .write(i * 16, &fill(i as u8 + 1, 16), WriteFlags::default())
                .unwrap(),
        );
    }
    for h in &handles {
        h.wait_data().unwrap();
    }
    wait_drained(&fx.dev);

    // Devices share a ticket, so sequence numbers order events across
    // both. Every data write must come after some log flush ack.
    // Formatting produced exactly one write and one flush (seqs 1-2);
    // skip those so only pipeline flushes count.
    let flush_seqs: Vec<u64> = fx
        .ldev
        .journal()
        .iter()
        .filter_map(|e| match e {
            MemEvent::Flush { seq } if *seq > 2 => Some(*seq),
            _ => None,
        })
        .collect();
    assert!(!flush_seqs.is_empty());

    let data_writes: Vec<u64> = fx.ddev.journal().iter().map(|e| e.seq()).collect();
    assert!(!data_writes.is_empty());
    for seq in data_writes {
        assert!(
            flush_seqs.iter().any(|f| *f < seq),
            "data write at seq {seq} preceded every log flush"
        );
    }

    let lsids = fx.dev.lsids();
    assert!(lsids.written <= lsids.permanent);
    assert!(lsids.permanent <= lsids.completed);
    assert!(lsids.completed <= lsids.latest);
}

#[test]
fn fua_write_forces_flush_before_payload() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());

    fx.dev
        .write(0, &fill(0x5A, 8), WriteFlags { flush: false, fua: true })
        .unwrap()
        .wait()
        .unwrap();

    let journal = fx.ldev.journal();
    let first_flush = journal.iter().position(|e| matches!(e, MemEvent::Flush { .. }));
    let payload_write = journal
        .iter()
        .rposition(|e| matches!(e, MemEvent::Write { .. }));
    assert!(first_flush.is_some());
    assert!(first_flush.unwrap() < payload_write.unwrap());
}

#[test]
fn log_write_failure_demotes_to_read_only() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());
    fx.ldev.set_fail_writes(true);

    let h = fx.dev.write(0, &fill(1, 8), WriteFlags::default()).unwrap();
    assert_eq!(h.wait(), Err(IoError::Io));
    poll_until("read-only transition", || fx.dev.is_read_only());

    // Subsequent writes fail fast; reads keep working.
    assert!(matches!(
        fx.dev.write(0, &fill(2, 8), WriteFlags::default()),
        Err(IoCoreError::ReadOnly)
    ));
    assert_eq!(fx.dev.read(0, 8).unwrap(), fill(0, 8));
}

#[test]
fn data_write_failure_demotes_but_ack_stands() {
    let fx = open_device(256, 4096, DeviceParams::default(), Tunables::default());
    fx.ddev.set_fail_writes(true);

    let h = fx.dev.write(8, &fill(0xEE, 8), WriteFlags::default()).unwrap();
    // Fast path still acknowledges: the log holds the write.
    h.wait().unwrap();
    assert_eq!(h.wait_data(), Err(IoError::Io));
    poll_until("read-only transition", || fx.dev.is_read_only());

    assert!(matches!(
        fx.dev.write(0, &fill(2, 8), WriteFlags::default()),
        Err(IoCoreError::ReadOnly)
    ));
    // Reads keep being served; the failed write never reached the DDEV.
    assert_eq!(fx.dev.read(8, 8).unwrap(), fill(0x00, 8));
}

#[test]
fn flush_incapable_ldev_treats_completion_as_permanent() {
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use walb_bdev::MemBdev;
    use walb_iocore::WalbDevice;

    let ticket = Arc::new(AtomicU64::new(0));
    let ldev = Arc::new(
        MemBdev::new((256 + HEADER_PB) * LB_PER_PB)
            .with_ticket(Arc::clone(&ticket))
            .with_flush_support(false),
    );
    let ddev = Arc::new(MemBdev::new(4096).with_ticket(ticket));
    walb_bdev::format_ldev(ldev.as_ref(), PBS, "noflush", 4096).unwrap();

    let dev = WalbDevice::open(
        Arc::clone(&ldev) as Arc<dyn walb_bdev::Bdev>,
        Arc::clone(&ddev) as Arc<dyn walb_bdev::Bdev>,
        0,
        DeviceParams::default(),
        Tunables::default(),
    )
    .unwrap();
    assert!(!dev.is_flush_capable());

    dev.write(0, &fill(3, 8), WriteFlags::default())
        .unwrap()
        .wait()
        .unwrap();
    poll_until("permanent to reach latest", || {
        let lsids = dev.lsids();
        lsids.permanent == lsids.latest && lsids.latest > 0
    });
    dev.close().unwrap();
}
