// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::mem::MemBdev;

#[test]
fn format_then_read_back() {
    let ldev = MemBdev::new(4096 * 8); // 16 MiB at 512-byte lb
    let sb = format_ldev(&ldev, 4096, "wdev0", 1 << 20).unwrap();

    let got = read_superblock(&ldev).unwrap();
    assert_eq!(got, sb);
    assert_eq!(got.name, "wdev0");
    assert_eq!(got.oldest_lsid, 0);
    assert_eq!(got.written_lsid, 0);

    // 4096*8 lb = 4096 pb at pbs 4096; header region is 11 pb.
    assert_eq!(got.ring_buffer_size, 4096 - 11);
}

#[test]
fn format_rejects_tiny_ldev() {
    let ldev = MemBdev::new(16);
    assert!(matches!(
        format_ldev(&ldev, 4096, "t", 1024),
        Err(FormatLdevError::TooSmall { .. })
    ));
}

#[test]
fn format_rejects_bad_pbs() {
    let ldev = MemBdev::new(4096);
    assert!(matches!(
        format_ldev(&ldev, 1024, "t", 1024),
        Err(FormatLdevError::Format(FormatError::InvalidPbs(1024)))
    ));
}

#[test]
fn superblock_probe_works_at_512() {
    let ldev = MemBdev::new(4096 * 8);
    let sb = format_ldev(&ldev, 512, "small", 1 << 20).unwrap();
    assert_eq!(read_superblock(&ldev).unwrap(), sb);
}

#[test]
fn reset_wal_rebases_and_changes_salt() {
    let ldev = MemBdev::new(4096 * 8);
    let mut sb = format_ldev(&ldev, 4096, "w", 1 << 20).unwrap();
    sb.oldest_lsid = 5;
    sb.written_lsid = 90;
    write_superblock(&ldev, &sb, true).unwrap();

    let after = reset_wal(&ldev).unwrap();
    assert_eq!(after.oldest_lsid, 90);
    assert_eq!(after.written_lsid, 90);
    assert_ne!(after.log_checksum_salt, sb.log_checksum_salt);
}

#[test]
fn fresh_images_get_distinct_identity() {
    let a = MemBdev::new(4096 * 8);
    let b = MemBdev::new(4096 * 8);
    let sba = format_ldev(&a, 4096, "a", 1024).unwrap();
    let sbb = format_ldev(&b, 4096, "b", 1024).unwrap();
    assert_ne!(sba.uuid, sbb.uuid);
}
