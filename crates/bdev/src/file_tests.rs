// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn create_sets_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ldev.img");
    let dev = FileBdev::create(&path, 64).unwrap();
    assert_eq!(dev.size_lb(), 64);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 64 * 512);
}

#[test]
fn write_read_roundtrip() {
    let dir = TempDir::new().unwrap();
    let dev = FileBdev::create(&dir.path().join("d.img"), 64).unwrap();

    let data = vec![0xAB; 1024];
    dev.write_at(3, &data).unwrap();
    dev.flush().unwrap();

    let mut back = vec![0u8; 1024];
    dev.read_at(3, &mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn out_of_range_rejected() {
    let dir = TempDir::new().unwrap();
    let dev = FileBdev::create(&dir.path().join("d.img"), 4).unwrap();
    let buf = vec![0u8; 1024];
    assert!(matches!(
        dev.write_at(3, &buf),
        Err(BdevError::OutOfRange { .. })
    ));
}

#[test]
fn second_open_is_refused_while_locked() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d.img");
    let dev = FileBdev::create(&path, 16).unwrap();
    assert!(matches!(FileBdev::open(&path), Err(BdevError::Locked(_))));

    drop(dev);
    assert!(FileBdev::open(&path).is_ok());
}

#[test]
fn open_preserves_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("d.img");
    {
        let dev = FileBdev::create(&path, 16).unwrap();
        dev.write_at(0, &[7u8; 512]).unwrap();
        dev.flush().unwrap();
    }
    let dev = FileBdev::open(&path).unwrap();
    let mut buf = vec![0u8; 512];
    dev.read_at(0, &mut buf).unwrap();
    assert_eq!(buf, vec![7u8; 512]);
}
