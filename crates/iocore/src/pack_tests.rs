// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::wrapper::BioWrapper;

const RING: u64 = 1024;

fn add_write(pack: &mut Pack, id: u64, pos_lb: u64, len_lb: u32) -> Arc<BioWrapper> {
    let w = Arc::new(BioWrapper::new_write(
        id,
        pos_lb,
        vec![0u8; len_lb as usize * 512],
        false,
        false,
    ));
    let lsid = pack.header.try_add(pos_lb, len_lb, false, RING).unwrap();
    w.set_lsid(lsid);
    pack.biows.push(Arc::clone(&w));
    w
}

#[test]
fn pack_with_matching_records_is_valid() {
    let mut pack = Pack::new(4096, 10);
    add_write(&mut pack, 1, 0, 16);
    add_write(&mut pack, 2, 100, 8);
    assert!(pack.is_prepared_valid());
    assert!(!pack.is_zero_flush());
}

#[test]
fn empty_pack_is_invalid() {
    let pack = Pack::new(4096, 0);
    assert!(!pack.is_prepared_valid());
}

#[test]
fn zero_flush_pack_is_detected() {
    let mut pack = Pack::new(4096, 5);
    pack.biows
        .push(Arc::new(BioWrapper::new_flush(1)));
    assert!(pack.is_zero_flush());
    pack.check_and_set_zero_flush();
    assert!(pack.is_zero_flush_only);
    assert!(pack.is_prepared_valid());
}

#[test]
fn mismatched_lsid_is_invalid() {
    let mut pack = Pack::new(4096, 10);
    let w = add_write(&mut pack, 1, 0, 16);
    w.set_lsid(999);
    assert!(!pack.is_prepared_valid());
}

#[test]
fn discard_flag_must_match_record() {
    let mut pack = Pack::new(4096, 10);
    let w = Arc::new(BioWrapper::new_discard(1, 50, 8));
    let lsid = pack.header.try_add(50, 8, false, RING).unwrap(); // wrongly non-discard
    w.set_lsid(lsid);
    pack.biows.push(w);
    assert!(!pack.is_prepared_valid());
}

#[test]
fn pack_valid_across_padding() {
    // Header at RING-3: a 3-pb write forces a padding record.
    let mut pack = Pack::new(4096, RING - 3);
    let w = Arc::new(BioWrapper::new_write(1, 8, vec![0u8; 24 * 512], false, false));
    let lsid = pack.header.try_add(8, 24, false, RING).unwrap();
    w.set_lsid(lsid);
    pack.biows.push(w);

    assert_eq!(pack.header.n_padding, 1);
    assert!(pack.is_prepared_valid());
}
