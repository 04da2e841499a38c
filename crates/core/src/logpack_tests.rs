// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

const RING: u64 = 1024;

#[test]
fn empty_header_consumes_no_log_space() {
    let h = LogpackHeader::new(4096, 100);
    assert_eq!(h.next_lsid(), 100);
    assert_eq!(h.pack_pb(), 0);
    assert!(h.is_valid());
}

#[test]
fn add_assigns_lsid_after_header_block() {
    let mut h = LogpackHeader::new(4096, 100);
    let lsid = h.try_add(0, 16, false, RING).unwrap();
    assert_eq!(lsid, 101);
    assert_eq!(h.n_records(), 1);
    assert_eq!(h.total_io_size, 2); // 16 lb = 2 pb at pbs 4096
    assert_eq!(h.next_lsid(), 103);
    assert!(h.is_valid());
}

#[test]
fn payloads_are_laid_out_back_to_back() {
    let mut h = LogpackHeader::new(4096, 0);
    let a = h.try_add(0, 8, false, RING).unwrap();
    let b = h.try_add(64, 9, false, RING).unwrap();
    assert_eq!(a, 1);
    assert_eq!(b, 2); // 8 lb fits one pb
    assert_eq!(h.total_io_size, 3); // 1 + 2 (9 lb rounds up)
    assert!(h.is_valid());
}

#[test]
fn discard_record_carries_no_payload() {
    let mut h = LogpackHeader::new(4096, 10);
    h.try_add(0, 8, false, RING).unwrap();
    let lsid = h.try_add(100, 256, true, RING).unwrap();
    assert_eq!(lsid, 12); // same slot as the next payload would use
    assert_eq!(h.total_io_size, 1);
    assert_eq!(h.n_records(), 2);
    assert!(h.records()[1].is_discard());
    assert!(h.is_valid());
}

#[test]
fn padding_inserted_at_ring_edge() {
    // Header at lsid RING-3 -> payload starts at ring offset RING-2.
    // A 2-pb write would end exactly at the edge; a 3-pb write must not
    // cross it, so padding fills the 2 remaining blocks.
    let mut h = LogpackHeader::new(4096, RING - 3);
    let lsid = h.try_add(0, 24, false, RING).unwrap(); // 3 pb
    assert_eq!(h.n_records(), 2);
    assert_eq!(h.n_padding, 1);

    let pad = h.records()[0];
    assert!(pad.is_padding());
    assert_eq!(u64::from(pad.lsid_local), 1);
    assert_eq!(u32::from(pad.io_size_lb), 2 * 8); // 2 pb in lb

    // The real record lands on the ring start.
    assert_eq!(lsid % RING, 0);
    assert_eq!(h.total_io_size, 2 + 3);
    assert!(h.is_valid());
}

#[test]
fn write_ending_exactly_at_ring_edge_needs_no_padding() {
    let mut h = LogpackHeader::new(4096, RING - 3);
    h.try_add(0, 16, false, RING).unwrap(); // 2 pb, ends at edge
    assert_eq!(h.n_padding, 0);
    assert_eq!(h.n_records(), 1);
    assert!(h.is_valid());
}

#[test]
fn header_capacity_is_bounded() {
    let mut h = LogpackHeader::new(512, 0);
    let max = max_n_records(512);
    for i in 0..max {
        assert!(h.try_add(i as u64 * 8, 8, false, u64::MAX >> 1).is_some());
    }
    assert!(h.try_add(0, 8, false, u64::MAX >> 1).is_none());
}

#[test]
fn encode_decode_preserves_records() {
    let mut h = LogpackHeader::new(4096, 77);
    h.try_add(12, 16, false, RING).unwrap();
    h.try_add(900, 8, true, RING).unwrap();
    h.records_mut()[0].checksum = 0xABCD_EF01;
    h.finalize_checksum(42);

    let mut buf = vec![0u8; 4096];
    h.encode(&mut buf);
    assert!(LogpackHeader::verify_buf(&buf, 42));
    assert!(!LogpackHeader::verify_buf(&buf, 43));

    let d = LogpackHeader::decode(&buf, 4096).unwrap();
    assert_eq!(d.logpack_lsid, 77);
    assert_eq!(d.n_records(), 2);
    assert_eq!(d.records(), h.records());
    assert_eq!(d.total_io_size, h.total_io_size);
}

#[test]
fn decode_rejects_wrong_sector_type() {
    let buf = vec![0u8; 4096];
    assert!(matches!(
        LogpackHeader::decode(&buf, 4096),
        Err(FormatError::InvalidSectorType { .. })
    ));
}

#[test]
fn corrupted_header_fails_verification() {
    let mut h = LogpackHeader::new(512, 5);
    h.try_add(0, 8, false, RING).unwrap();
    h.finalize_checksum(9);

    let mut buf = vec![0u8; 512];
    h.encode(&mut buf);
    buf[40] ^= 0x01;
    assert!(!LogpackHeader::verify_buf(&buf, 9));
}

proptest! {
    #[test]
    fn added_records_chain_lsids(
        lsid in 0u64..10_000,
        lens in proptest::collection::vec(1u32..64, 1..10),
    ) {
        let mut h = LogpackHeader::new(4096, lsid);
        for (i, len) in lens.iter().enumerate() {
            if h.try_add(i as u64 * 128, *len, false, RING).is_none() {
                break;
            }
        }
        prop_assert!(h.is_valid());
        prop_assert!(h.next_lsid() >= lsid);
    }
}
