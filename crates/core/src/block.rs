// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical/physical block size math
//!
//! Addresses and I/O sizes on the client side are in logical blocks of
//! 512 bytes. The log device is addressed in physical blocks (PBS, 512 or
//! 4096 bytes device-wide), so the logpack layout needs conversions in
//! both directions.

/// Logical block size in bytes. Fixed for every device.
pub const LOGICAL_BLOCK_SIZE: u32 = 512;

/// Returns whether `pbs` is a supported physical block size.
pub fn is_valid_pbs(pbs: u32) -> bool {
    pbs == 512 || pbs == 4096
}

/// Number of logical blocks in one physical block.
pub fn n_lb_in_pb(pbs: u32) -> u32 {
    debug_assert!(is_valid_pbs(pbs));
    pbs / LOGICAL_BLOCK_SIZE
}

/// Number of physical blocks required to hold `len_lb` logical blocks.
pub fn capacity_pb(pbs: u32, len_lb: u32) -> u32 {
    let n = n_lb_in_pb(pbs);
    len_lb.div_ceil(n)
}

/// Convert a physical-block address to a logical-block address.
pub fn addr_lb(pbs: u32, pb: u64) -> u64 {
    pb * u64::from(n_lb_in_pb(pbs))
}

/// Convert a logical-block address to the physical block containing it.
pub fn addr_pb(pbs: u32, lb: u64) -> u64 {
    lb / u64::from(n_lb_in_pb(pbs))
}
