// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extract/replay laws over a hand-built ring

use tempfile::TempDir;
use walb_bdev::{format_ldev, Bdev, MemBdev};
use walb_core::{addr_lb, capacity_pb, checksum, DiscardPolicy, LogpackHeader, Superblock};
use walb_wlog::{extract, replay_file, RingReader};

const PBS: u32 = 4096;

/// Write one logpack (header + payload) to the ring, the way the log
/// submitter lays it out. Returns the next lsid.
fn write_pack(ldev: &dyn Bdev, sb: &Superblock, lsid: u64, writes: &[(u64, Vec<u8>)]) -> u64 {
    let ring = sb.ring_buffer_size;
    let off = sb.ring_buffer_offset_pb();
    let mut header = LogpackHeader::new(PBS, lsid);

    let mut payloads = Vec::new();
    for (pos_lb, data) in writes {
        let len_lb = (data.len() / 512) as u32;
        let rec_lsid = header.try_add(*pos_lb, len_lb, false, ring).unwrap();
        payloads.push((rec_lsid, data.clone()));
        let idx = header.records().len() - 1;
        header.records_mut()[idx].checksum = checksum(data, sb.log_checksum_salt);
    }
    header.finalize_checksum(sb.log_checksum_salt);

    let mut hbuf = vec![0u8; PBS as usize];
    header.encode(&mut hbuf);
    ldev.write_at(addr_lb(PBS, lsid % ring + off), &hbuf).unwrap();

    for (rec_lsid, data) in payloads {
        let n_pb = capacity_pb(PBS, (data.len() / 512) as u32) as u64;
        let mut padded = data;
        padded.resize((n_pb * u64::from(PBS)) as usize, 0);
        for i in 0..n_pb {
            let pb = (rec_lsid + i) % ring + off;
            let chunk = &padded[(i * u64::from(PBS)) as usize..((i + 1) * u64::from(PBS)) as usize];
            ldev.write_at(addr_lb(PBS, pb), chunk).unwrap();
        }
    }
    header.next_lsid()
}

fn fill(byte: u8, lb: usize) -> Vec<u8> {
    vec![byte; lb * 512]
}

#[test]
fn extract_then_replay_reproduces_data_device() {
    let dir = TempDir::new().unwrap();
    let ldev = MemBdev::new(4096 * 8);
    let sb = format_ldev(&ldev, PBS, "rt", 1 << 16).unwrap();

    let mut lsid = 0;
    lsid = write_pack(&ldev, &sb, lsid, &[(0, fill(0x11, 16)), (64, fill(0x22, 8))]);
    lsid = write_pack(&ldev, &sb, lsid, &[(8, fill(0x33, 16))]);
    lsid = write_pack(&ldev, &sb, lsid, &[(1000, fill(0x44, 9))]);

    let wlog = dir.path().join("out.wlog");
    let summary = extract(&ldev, &sb, 0, lsid, &wlog).unwrap();
    assert_eq!(summary.n_packs, 3);
    assert_eq!(summary.end_lsid, lsid);

    // The expected data-device state, applied by hand.
    let expected = MemBdev::new(1 << 16);
    expected.write_at(0, &fill(0x11, 16)).unwrap();
    expected.write_at(64, &fill(0x22, 8)).unwrap();
    expected.write_at(8, &fill(0x33, 16)).unwrap();
    expected.write_at(1000, &fill(0x44, 9)).unwrap();

    let ddev = MemBdev::new(1 << 16);
    let replayed = replay_file(&wlog, &ddev, DiscardPolicy::Elide).unwrap();
    assert_eq!(replayed.n_packs, 3);
    assert_eq!(replayed.end_lsid, lsid);
    assert_eq!(ddev.snapshot(), expected.snapshot());
}

#[test]
fn replay_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ldev = MemBdev::new(4096 * 8);
    let sb = format_ldev(&ldev, PBS, "idem", 1 << 16).unwrap();

    let lsid = write_pack(&ldev, &sb, 0, &[(0, fill(0xAA, 8)), (32, fill(0xBB, 24))]);

    let wlog = dir.path().join("out.wlog");
    extract(&ldev, &sb, 0, lsid, &wlog).unwrap();

    let ddev = MemBdev::new(1 << 16);
    replay_file(&wlog, &ddev, DiscardPolicy::Elide).unwrap();
    let once = ddev.snapshot();
    replay_file(&wlog, &ddev, DiscardPolicy::Elide).unwrap();
    assert_eq!(ddev.snapshot(), once);
}

#[test]
fn pack_straddling_ring_edge_reads_back_intact() {
    let ldev = MemBdev::new(4096 * 8);
    let mut sb = format_ldev(&ldev, PBS, "wrap", 1 << 16).unwrap();
    // Shrink the ring so a pack lands on the edge quickly.
    sb.ring_buffer_size = 16;

    // Header at lsid 14 -> payload would cross the edge; the builder
    // inserts padding and the record lands at ring offset 0.
    let lsid0 = 14;
    let next = write_pack(&ldev, &sb, lsid0, &[(256, fill(0x5C, 24))]);
    assert!(next > 16); // wrapped past the edge

    let mut reader = RingReader::new(&ldev, &sb, lsid0, next);
    let pack = reader.next_pack().unwrap().unwrap();
    assert_eq!(pack.header.n_padding, 1);
    let rec_idx = pack
        .header
        .records()
        .iter()
        .position(|r| !r.is_padding())
        .unwrap();
    assert_eq!(pack.record_data(rec_idx), &fill(0x5C, 24)[..]);
    assert!(reader.next_pack().unwrap().is_none());
}

#[test]
fn corrupted_pack_stops_extraction() {
    let dir = TempDir::new().unwrap();
    let ldev = MemBdev::new(4096 * 8);
    let sb = format_ldev(&ldev, PBS, "bad", 1 << 16).unwrap();

    let mid = write_pack(&ldev, &sb, 0, &[(0, fill(1, 8))]);
    let end = write_pack(&ldev, &sb, mid, &[(8, fill(2, 8))]);

    // Corrupt the second pack's header.
    let off = sb.ring_buffer_offset_pb();
    let mut buf = vec![0u8; PBS as usize];
    ldev.read_at(addr_lb(PBS, mid % sb.ring_buffer_size + off), &mut buf)
        .unwrap();
    buf[100] ^= 0xFF;
    ldev.write_at(addr_lb(PBS, mid % sb.ring_buffer_size + off), &buf)
        .unwrap();

    let err = extract(&ldev, &sb, 0, end, &dir.path().join("x.wlog"));
    assert!(err.is_err());
}
