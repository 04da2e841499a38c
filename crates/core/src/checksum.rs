// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Salted CRC32 checksums
//!
//! Every logpack header and payload checksum is salted with a device-wide
//! value drawn at format time, so sectors are bound to the device that
//! wrote them: a header copied from another device fails verification
//! even when its contents are otherwise well-formed.

/// CRC32 of `data` salted with the device checksum salt.
///
/// The salt is hashed (native-endian) ahead of the payload.
pub fn checksum(data: &[u8], salt: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&salt.to_ne_bytes());
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_checksum() {
        let data = b"walb logpack payload";
        assert_eq!(checksum(data, 42), checksum(data, 42));
    }

    #[test]
    fn salt_changes_checksum() {
        let data = b"walb logpack payload";
        assert_ne!(checksum(data, 1), checksum(data, 2));
    }

    #[test]
    fn data_changes_checksum() {
        assert_ne!(checksum(b"aaaa", 7), checksum(b"aaab", 7));
    }

    #[test]
    fn empty_data_is_salted() {
        assert_ne!(checksum(&[], 1), checksum(&[], 2));
    }
}
