// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instrumented in-memory block device for tests
//!
//! Records every write, flush and discard in an event journal with a
//! global sequence number, so tests can assert ordering properties
//! (durability-before-data, overlap serialization). Write and flush
//! failures can be injected to drive the read-only transitions.

use crate::bdev::{check_access, Bdev, BdevError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use walb_core::LOGICAL_BLOCK_SIZE;

/// One journaled device operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemEvent {
    Write { seq: u64, pos_lb: u64, len_lb: u64 },
    Flush { seq: u64 },
    Discard { seq: u64, pos_lb: u64, len_lb: u64 },
}

impl MemEvent {
    pub fn seq(&self) -> u64 {
        match *self {
            MemEvent::Write { seq, .. } | MemEvent::Flush { seq } | MemEvent::Discard { seq, .. } => {
                seq
            }
        }
    }
}

struct MemInner {
    data: Vec<u8>,
    journal: Vec<MemEvent>,
}

pub struct MemBdev {
    inner: Mutex<MemInner>,
    size_lb: u64,
    flush_support: bool,
    discard_support: bool,
    fail_writes: AtomicBool,
    fail_flush: AtomicBool,
    /// Event sequence source. Share one across devices to get a global
    /// order for cross-device assertions.
    ticket: Arc<AtomicU64>,
    /// Artificial latency applied to writes, to hold them in flight.
    write_delay_ms: AtomicU64,
}

impl MemBdev {
    pub fn new(size_lb: u64) -> Self {
        Self {
            inner: Mutex::new(MemInner {
                data: vec![0u8; (size_lb * u64::from(LOGICAL_BLOCK_SIZE)) as usize],
                journal: Vec::new(),
            }),
            size_lb,
            flush_support: true,
            discard_support: false,
            fail_writes: AtomicBool::new(false),
            fail_flush: AtomicBool::new(false),
            ticket: Arc::new(AtomicU64::new(0)),
            write_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn with_flush_support(mut self, supported: bool) -> Self {
        self.flush_support = supported;
        self
    }

    pub fn with_discard_support(mut self, supported: bool) -> Self {
        self.discard_support = supported;
        self
    }

    /// Use a shared sequence source so events on several devices are
    /// globally ordered.
    pub fn with_ticket(mut self, ticket: Arc<AtomicU64>) -> Self {
        self.ticket = ticket;
        self
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn next_seq(&self) -> u64 {
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Copy of the event journal in submission order.
    pub fn journal(&self) -> Vec<MemEvent> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .journal
            .clone()
    }

    /// Full copy of the device contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .data
            .clone()
    }

    /// Sequence number of the last flush, if any.
    pub fn last_flush_seq(&self) -> Option<u64> {
        self.journal().iter().rev().find_map(|e| match e {
            MemEvent::Flush { seq } => Some(*seq),
            _ => None,
        })
    }
}

impl Bdev for MemBdev {
    fn size_lb(&self) -> u64 {
        self.size_lb
    }

    fn read_at(&self, pos_lb: u64, buf: &mut [u8]) -> Result<(), BdevError> {
        check_access(self.size_lb, pos_lb, buf.len())?;
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let off = (pos_lb * u64::from(LOGICAL_BLOCK_SIZE)) as usize;
        buf.copy_from_slice(&inner.data[off..off + buf.len()]);
        Ok(())
    }

    fn write_at(&self, pos_lb: u64, buf: &[u8]) -> Result<(), BdevError> {
        check_access(self.size_lb, pos_lb, buf.len())?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BdevError::Faulted("write"));
        }
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        let seq = self.next_seq();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let off = (pos_lb * u64::from(LOGICAL_BLOCK_SIZE)) as usize;
        inner.data[off..off + buf.len()].copy_from_slice(buf);
        inner.journal.push(MemEvent::Write {
            seq,
            pos_lb,
            len_lb: (buf.len() / LOGICAL_BLOCK_SIZE as usize) as u64,
        });
        Ok(())
    }

    fn flush(&self) -> Result<(), BdevError> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(BdevError::Faulted("flush"));
        }
        let seq = self.next_seq();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.journal.push(MemEvent::Flush { seq });
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        self.flush_support
    }

    fn supports_discard(&self) -> bool {
        self.discard_support
    }

    fn discard(&self, pos_lb: u64, len_lb: u32) -> Result<(), BdevError> {
        if !self.discard_support {
            return Err(BdevError::DiscardUnsupported);
        }
        check_access(self.size_lb, pos_lb, len_lb as usize * LOGICAL_BLOCK_SIZE as usize)?;
        let seq = self.next_seq();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let off = (pos_lb * u64::from(LOGICAL_BLOCK_SIZE)) as usize;
        let len = len_lb as usize * LOGICAL_BLOCK_SIZE as usize;
        inner.data[off..off + len].fill(0);
        inner.journal.push(MemEvent::Discard {
            seq,
            pos_lb,
            len_lb: u64::from(len_lb),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_records_order() {
        let dev = MemBdev::new(64);
        dev.write_at(0, &[1u8; 512]).unwrap();
        dev.flush().unwrap();
        dev.write_at(8, &[2u8; 512]).unwrap();

        let journal = dev.journal();
        assert_eq!(journal.len(), 3);
        assert!(matches!(journal[0], MemEvent::Write { seq: 1, pos_lb: 0, .. }));
        assert!(matches!(journal[1], MemEvent::Flush { seq: 2 }));
        assert!(matches!(journal[2], MemEvent::Write { seq: 3, pos_lb: 8, .. }));
        assert_eq!(dev.last_flush_seq(), Some(2));
    }

    #[test]
    fn injected_failures() {
        let dev = MemBdev::new(64);
        dev.set_fail_writes(true);
        assert!(matches!(
            dev.write_at(0, &[0u8; 512]),
            Err(BdevError::Faulted("write"))
        ));
        dev.set_fail_writes(false);
        dev.write_at(0, &[0u8; 512]).unwrap();

        dev.set_fail_flush(true);
        assert!(matches!(dev.flush(), Err(BdevError::Faulted("flush"))));
    }

    #[test]
    fn discard_zeroes_when_supported() {
        let dev = MemBdev::new(64).with_discard_support(true);
        dev.write_at(0, &[0xFF; 1024]).unwrap();
        dev.discard(0, 1).unwrap();

        let mut buf = vec![1u8; 1024];
        dev.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf[..512], &[0u8; 512]);
        assert_eq!(&buf[512..], &[0xFF; 512]);
    }

    #[test]
    fn discard_rejected_without_support() {
        let dev = MemBdev::new(64);
        assert!(matches!(
            dev.discard(0, 1),
            Err(BdevError::DiscardUnsupported)
        ));
    }
}
