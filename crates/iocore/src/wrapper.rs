// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request state: the bio wrapper
//!
//! Each client request is wrapped once and then travels through the
//! pipeline by ownership transfer: submit queue, pack, data queues, GC.
//! The pending and overlap indexes hold additional references that are
//! removed before the GC stage retires the wrapper. Ids are assigned in
//! submission order, which makes them a tiebreaker for "newest write
//! wins" decisions in the pending index.

use crate::error::IoError;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use walb_core::{INVALID_LSID, LOGICAL_BLOCK_SIZE};

/// Dequeued by the pack builder; counted in `n_started_write_bio`.
pub const STATE_STARTED: u32 = 1 << 0;
/// Log write done, pending-index entry made; ready for the data stage.
pub const STATE_PREPARED: u32 = 1 << 1;
/// Data-device write issued.
pub const STATE_SUBMITTED: u32 = 1 << 2;
/// Data-device write finished.
pub const STATE_COMPLETED: u32 = 1 << 3;
/// Held back by the overlap serializer.
pub const STATE_DELAYED: u32 = 1 << 4;
/// Fully covered by a newer pending write; skip pending delete.
pub const STATE_OVERWRITTEN: u32 = 1 << 5;

/// What the wrapper carries.
#[derive(Debug)]
pub enum IoPayload {
    /// Normal write data; length is a multiple of the logical block size.
    Data(Vec<u8>),
    /// Discard: a range with no payload.
    Discard,
    /// Zero-length flush.
    Flush,
}

/// A one-shot completion slot with blocking waiters.
pub struct Signal {
    state: Mutex<Option<Result<(), IoError>>>,
    cond: Condvar,
}

impl Signal {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    pub fn complete(&self, result: Result<(), IoError>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.is_none() {
            *state = Some(result);
            self.cond.notify_all();
        }
    }

    pub fn is_done(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn wait(&self) -> Result<(), IoError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(result) = *state {
                return result;
            }
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Wait up to `timeout`; `None` on expiry.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), IoError>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(result) = *state {
                return Some(result);
            }
            let (guard, wait_result) = self
                .cond
                .wait_timeout(state, timeout)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
            if wait_result.timed_out() {
                return *state;
            }
        }
    }
}

pub struct BioWrapper {
    pub id: u64,
    pub pos_lb: u64,
    pub len_lb: u32,
    pub is_flush: bool,
    pub is_fua: bool,
    payload: IoPayload,
    /// Salted checksum of the payload (writes only).
    pub csum: u32,
    lsid: AtomicU64,
    state: AtomicU32,
    n_overlapped: AtomicU32,
    error: Mutex<Option<IoError>>,
    retired: AtomicBool,
    /// Client-visible acknowledgement (fast path: after log completion).
    pub completion: Signal,
    /// Data-device completion; the GC stage waits on this.
    pub done: Signal,
}

impl BioWrapper {
    pub fn new_write(id: u64, pos_lb: u64, data: Vec<u8>, is_flush: bool, is_fua: bool) -> Self {
        debug_assert!(data.len() % LOGICAL_BLOCK_SIZE as usize == 0);
        debug_assert!(!data.is_empty());
        let len_lb = (data.len() / LOGICAL_BLOCK_SIZE as usize) as u32;
        Self::new(id, pos_lb, len_lb, IoPayload::Data(data), is_flush, is_fua)
    }

    pub fn new_discard(id: u64, pos_lb: u64, len_lb: u32) -> Self {
        Self::new(id, pos_lb, len_lb, IoPayload::Discard, false, false)
    }

    pub fn new_flush(id: u64) -> Self {
        Self::new(id, 0, 0, IoPayload::Flush, true, false)
    }

    fn new(
        id: u64,
        pos_lb: u64,
        len_lb: u32,
        payload: IoPayload,
        is_flush: bool,
        is_fua: bool,
    ) -> Self {
        Self {
            id,
            pos_lb,
            len_lb,
            is_flush,
            is_fua,
            payload,
            csum: 0,
            lsid: AtomicU64::new(INVALID_LSID),
            state: AtomicU32::new(0),
            n_overlapped: AtomicU32::new(0),
            error: Mutex::new(None),
            retired: AtomicBool::new(false),
            completion: Signal::new(),
            done: Signal::new(),
        }
    }

    pub fn end_lb(&self) -> u64 {
        self.pos_lb + u64::from(self.len_lb)
    }

    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            IoPayload::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self.payload, IoPayload::Discard)
    }

    pub fn is_zero_flush(&self) -> bool {
        self.len_lb == 0
    }

    pub fn set_lsid(&self, lsid: u64) {
        self.lsid.store(lsid, Ordering::Release);
    }

    pub fn lsid(&self) -> u64 {
        self.lsid.load(Ordering::Acquire)
    }

    pub fn set_state(&self, bit: u32) {
        self.state.fetch_or(bit, Ordering::AcqRel);
    }

    pub fn clear_state(&self, bit: u32) {
        self.state.fetch_and(!bit, Ordering::AcqRel);
    }

    pub fn has_state(&self, bit: u32) -> bool {
        self.state.load(Ordering::Acquire) & bit != 0
    }

    pub fn set_error(&self, error: IoError) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn error(&self) -> Option<IoError> {
        *self.error.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overlap count; mutated only under the overlap-table lock.
    pub fn set_n_overlapped(&self, n: u32) {
        self.n_overlapped.store(n, Ordering::Release);
    }

    pub fn dec_n_overlapped(&self) -> u32 {
        self.n_overlapped.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn n_overlapped(&self) -> u32 {
        self.n_overlapped.load(Ordering::Acquire)
    }

    /// Mark retired; returns true exactly once.
    pub fn mark_retired(&self) -> bool {
        !self.retired.swap(true, Ordering::AcqRel)
    }
}

/// Client handle for an accepted write, flush or discard.
pub struct IoHandle {
    wrapper: Arc<BioWrapper>,
}

impl IoHandle {
    pub(crate) fn new(wrapper: Arc<BioWrapper>) -> Self {
        Self { wrapper }
    }

    /// Block until the request is acknowledged.
    ///
    /// For writes this is the fast-path acknowledgement: the logpack is
    /// complete and the bytes are visible to reads, though the data
    /// device may not have been written yet.
    pub fn wait(&self) -> Result<(), IoError> {
        self.wrapper.completion.wait()
    }

    /// Like [`wait`](IoHandle::wait) with a deadline; `None` on expiry.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), IoError>> {
        self.wrapper.completion.wait_timeout(timeout)
    }

    /// Block until the data-device write has finished as well.
    pub fn wait_data(&self) -> Result<(), IoError> {
        self.wrapper.completion.wait()?;
        if self.wrapper.is_zero_flush() {
            return Ok(());
        }
        self.wrapper.done.wait()
    }

    /// The lsid assigned to this request, once packed.
    pub fn lsid(&self) -> Option<u64> {
        match self.wrapper.lsid() {
            INVALID_LSID => None,
            lsid => Some(lsid),
        }
    }
}

#[cfg(test)]
#[path = "wrapper_tests.rs"]
mod tests;
