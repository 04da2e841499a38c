// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The WalB virtual device
//!
//! [`WalbDevice`] owns the whole pipeline: it accepts client I/O,
//! schedules the four single-runner stage tasks, runs the GC and
//! checkpoint workers, and exposes the control surface (freeze/melt,
//! reset-wal, resize, watermark queries, lsid events).
//!
//! Opening a device replays any log beyond the checkpointed
//! `written_lsid` onto the data device (crash recovery), so all
//! watermarks start at the recovered front.

use crate::checkpoint;
use crate::error::IoCoreError;
use crate::gc;
use crate::notify::{LsidEvent, LsidEventHub};
use crate::overlap::OverlapIndex;
use crate::pending::{apply_patches, PendingIndex};
use crate::queues::StageQueues;
use crate::state::{
    DeviceState, STATE_FAILURE, STATE_LOG_OVERFLOW, STATE_SUBMIT_DATA_WORKING,
    STATE_SUBMIT_LOG_WORKING, STATE_WAIT_DATA_WORKING, STATE_WAIT_LOG_WORKING,
};
use crate::wrapper::{BioWrapper, IoHandle, STATE_STARTED};
use crate::{submit_data, submit_log, wait_data, wait_log};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use walb_bdev::{read_superblock, write_superblock, Bdev};
use walb_core::{
    addr_lb, checksum, Clock, DeviceParams, Lsids, RateLimit, Superblock, SystemClock, Tunables,
    LOGICAL_BLOCK_SIZE,
};
use walb_wlog::{apply_pack, RingReader};

/// Flags carried by a client write.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteFlags {
    /// All previously accepted writes must be durable before this one.
    pub flush: bool,
    /// This write itself must be durable when acknowledged.
    pub fua: bool,
}

pub(crate) struct LsidTrack {
    pub lsids: Lsids,
    /// Deadline of the period trigger for flush headers.
    pub log_flush_deadline: Instant,
}

pub(crate) struct PendingState {
    pub index: PendingIndex,
    pub under_throttle: bool,
    pub restart_deadline: Instant,
}

pub(crate) struct DeviceInner {
    pub name: String,
    pub minor: u32,
    pub uuid: [u8; 16],
    pub pbs: u32,
    salt: AtomicU32,
    pub ring_buffer_off: u64,
    pub ring_buffer_size: u64,
    pub device_size_lb: AtomicU64,
    pub ldev: Arc<dyn Bdev>,
    pub ddev: Arc<dyn Bdev>,
    pub params: DeviceParams,
    pub tunables: Tunables,
    pub clock: Arc<dyn Clock>,
    pub state: DeviceState,
    pub lsid_state: Mutex<LsidTrack>,
    pub queues: StageQueues,
    pub pending: Mutex<PendingState>,
    pub overlap: Mutex<OverlapIndex>,
    pub superblock: Mutex<Superblock>,
    pub events: LsidEventHub,
    pub overflow_warn: RateLimit,
    pub consistency_warn: RateLimit,
    pub checkpoint_interval_ms: AtomicU64,
    pub shutdown: AtomicBool,
    next_io_id: AtomicU64,
}

impl DeviceInner {
    pub fn salt(&self) -> u32 {
        self.salt.load(Ordering::Acquire)
    }

    /// Write a buffer at the ring position of `lsid`.
    pub fn ldev_write_pb(&self, lsid: u64, buf: &[u8]) -> Result<(), walb_bdev::BdevError> {
        let pb = lsid % self.ring_buffer_size + self.ring_buffer_off;
        self.ldev.write_at(addr_lb(self.pbs, pb), buf)
    }

    /// Raise the permanent watermark to `target`, publishing the edge
    /// event when durable log first appears beyond `oldest`.
    pub fn advance_permanent_to(&self, target: u64) {
        let should_notice = {
            let mut track = self.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            if track.lsids.permanent < target {
                let was_empty = track.lsids.is_permanent_log_empty();
                track.lsids.permanent = target;
                debug_assert!(track.lsids.permanent <= track.lsids.completed);
                was_empty && !track.lsids.is_permanent_log_empty()
            } else {
                false
            }
        };
        if should_notice {
            self.events.publish(LsidEvent::PermanentLogNonEmpty);
        }
    }

    /// Final release of a wrapper; adjusts the in-flight counters once.
    pub fn retire_wrapper(&self, w: &Arc<BioWrapper>) {
        if !w.mark_retired() {
            return;
        }
        if w.has_state(STATE_STARTED) {
            self.state
                .n_started_write_bio
                .fetch_sub(1, Ordering::AcqRel);
        }
        self.state.n_pending_bio.fetch_sub(1, Ordering::AcqRel);
    }

    fn next_io_id(&self) -> u64 {
        self.next_io_id.fetch_add(1, Ordering::AcqRel)
    }
}

fn spawn_stage(dev: &Arc<DeviceInner>, bit: u32, name: &str, task: fn(&Arc<DeviceInner>)) {
    if !dev.state.test_and_set(bit) {
        return;
    }
    let worker = Arc::clone(dev);
    let spawned = std::thread::Builder::new()
        .name(format!("{}/{}", name, dev.minor))
        .spawn(move || task(&worker));
    if let Err(e) = spawned {
        dev.state.clear(bit);
        tracing::error!(error = %e, stage = name, "failed to spawn stage task");
    }
}

pub(crate) fn enqueue_submit_log_task(dev: &Arc<DeviceInner>) {
    spawn_stage(dev, STATE_SUBMIT_LOG_WORKING, "walb-logsub", submit_log::task);
}

pub(crate) fn enqueue_wait_log_task(dev: &Arc<DeviceInner>) {
    spawn_stage(dev, STATE_WAIT_LOG_WORKING, "walb-logwait", wait_log::task);
}

pub(crate) fn enqueue_submit_data_task(dev: &Arc<DeviceInner>) {
    spawn_stage(dev, STATE_SUBMIT_DATA_WORKING, "walb-datasub", submit_data::task);
}

pub(crate) fn enqueue_wait_data_task(dev: &Arc<DeviceInner>) {
    spawn_stage(dev, STATE_WAIT_DATA_WORKING, "walb-datawait", wait_data::task);
}

/// Drop one stopper; the last one re-opens the submission pipeline.
pub(crate) fn melt_device(dev: &Arc<DeviceInner>) {
    if dev.state.n_stoppers.fetch_sub(1, Ordering::AcqRel) == 1 {
        tracing::info!(name = %dev.name, "iocore melted");
        enqueue_submit_log_task(dev);
    }
}

/// A WalB virtual block device over a log device and a data device.
pub struct WalbDevice {
    inner: Arc<DeviceInner>,
    gc_worker: Mutex<Option<JoinHandle<()>>>,
    checkpoint_worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WalbDevice {
    /// Open a formatted device with the system clock.
    pub fn open(
        ldev: Arc<dyn Bdev>,
        ddev: Arc<dyn Bdev>,
        minor: u32,
        params: DeviceParams,
        tunables: Tunables,
    ) -> Result<Self, IoCoreError> {
        Self::open_with_clock(ldev, ddev, minor, params, tunables, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        ldev: Arc<dyn Bdev>,
        ddev: Arc<dyn Bdev>,
        minor: u32,
        params: DeviceParams,
        tunables: Tunables,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, IoCoreError> {
        params.validate()?;
        let mut sb = read_superblock(ldev.as_ref())?;

        if sb.device_size_lb > ddev.size_lb() {
            return Err(IoCoreError::InvalidInput(format!(
                "data device too small: {} blocks, superblock says {}",
                ddev.size_lb(),
                sb.device_size_lb
            )));
        }

        // Crash recovery: replay valid log beyond the checkpointed
        // front onto the data device; the first invalid pack is the
        // crash point.
        let recovered = redo_log(ldev.as_ref(), ddev.as_ref(), &sb, &tunables)?;
        if recovered != sb.written_lsid {
            tracing::info!(
                name = %sb.name,
                from = sb.written_lsid,
                to = recovered,
                "applied log to data device during recovery"
            );
            sb.written_lsid = recovered;
            write_superblock(ldev.as_ref(), &sb, true)?;
        }

        let now = clock.now();
        let inner = Arc::new(DeviceInner {
            name: sb.name.clone(),
            minor,
            uuid: sb.uuid,
            pbs: sb.physical_bs,
            salt: AtomicU32::new(sb.log_checksum_salt),
            ring_buffer_off: sb.ring_buffer_offset_pb(),
            ring_buffer_size: sb.ring_buffer_size,
            device_size_lb: AtomicU64::new(sb.device_size_lb),
            ldev,
            ddev,
            checkpoint_interval_ms: AtomicU64::new(params.checkpoint_interval_ms),
            params,
            tunables,
            clock,
            state: DeviceState::new(),
            lsid_state: Mutex::new(LsidTrack {
                lsids: {
                    let mut lsids = Lsids::new(recovered);
                    lsids.oldest = sb.oldest_lsid;
                    lsids
                },
                log_flush_deadline: now,
            }),
            queues: StageQueues::new(),
            pending: Mutex::new(PendingState {
                index: PendingIndex::new(),
                under_throttle: false,
                restart_deadline: now,
            }),
            overlap: Mutex::new(OverlapIndex::new()),
            superblock: Mutex::new(sb),
            events: LsidEventHub::new(),
            overflow_warn: RateLimit::default(),
            consistency_warn: RateLimit::default(),
            shutdown: AtomicBool::new(false),
            next_io_id: AtomicU64::new(0),
        });

        let gc_worker = gc::spawn(&inner).map_err(walb_bdev::BdevError::Io)?;
        let checkpoint_worker = checkpoint::spawn(&inner).map_err(walb_bdev::BdevError::Io)?;

        tracing::info!(name = %inner.name, minor, "walb device opened");
        Ok(Self {
            inner,
            gc_worker: Mutex::new(Some(gc_worker)),
            checkpoint_worker: Mutex::new(Some(checkpoint_worker)),
            closed: AtomicBool::new(false),
        })
    }

    /// Submit a write of `data` at `pos_lb`. Acknowledged (via the
    /// handle) once its logpack is complete; the data-device write
    /// finishes in the background.
    pub fn write(
        &self,
        pos_lb: u64,
        data: &[u8],
        flags: WriteFlags,
    ) -> Result<IoHandle, IoCoreError> {
        self.check_writable()?;
        if data.is_empty() || data.len() % LOGICAL_BLOCK_SIZE as usize != 0 {
            return Err(IoCoreError::InvalidInput(format!(
                "write length {} is not a positive multiple of {}",
                data.len(),
                LOGICAL_BLOCK_SIZE
            )));
        }
        let len_lb = (data.len() / LOGICAL_BLOCK_SIZE as usize) as u64;
        self.check_range(pos_lb, len_lb)?;
        if len_lb > u64::from(u16::MAX) {
            return Err(IoCoreError::InvalidInput(format!(
                "write of {len_lb} blocks exceeds the logpack record limit"
            )));
        }

        let mut w = BioWrapper::new_write(
            self.inner.next_io_id(),
            pos_lb,
            data.to_vec(),
            flags.flush,
            flags.fua,
        );
        w.csum = checksum(data, self.inner.salt());
        Ok(self.submit(w))
    }

    /// Submit a zero-length flush: all previously accepted writes are
    /// durable once the handle completes.
    pub fn flush(&self) -> Result<IoHandle, IoCoreError> {
        self.check_writable()?;
        let w = BioWrapper::new_flush(self.inner.next_io_id());
        Ok(self.submit(w))
    }

    /// Submit a discard of `[pos_lb, pos_lb + len_lb)`.
    pub fn discard(&self, pos_lb: u64, len_lb: u32) -> Result<IoHandle, IoCoreError> {
        self.check_writable()?;
        if len_lb == 0 {
            return Err(IoCoreError::InvalidInput("empty discard".to_string()));
        }
        if len_lb > u32::from(u16::MAX) {
            return Err(IoCoreError::InvalidInput(format!(
                "discard of {len_lb} blocks exceeds the logpack record limit"
            )));
        }
        self.check_range(pos_lb, u64::from(len_lb))?;
        let w = BioWrapper::new_discard(self.inner.next_io_id(), pos_lb, len_lb);
        Ok(self.submit(w))
    }

    fn submit(&self, w: BioWrapper) -> IoHandle {
        let w = Arc::new(w);
        self.inner.state.n_pending_bio.fetch_add(1, Ordering::AcqRel);
        {
            let mut queue = self
                .inner
                .queues
                .log_submit
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            queue.push_back(Arc::clone(&w));
        }
        if !self.inner.state.is_frozen() {
            enqueue_submit_log_task(&self.inner);
        }
        IoHandle::new(w)
    }

    /// Read `len_lb` blocks at `pos_lb`. In-flight writes are patched
    /// over the data-device contents, so the result reflects every
    /// acknowledged write regardless of persistence.
    pub fn read(&self, pos_lb: u64, len_lb: u32) -> Result<Vec<u8>, IoCoreError> {
        if self.inner.state.test(STATE_FAILURE) {
            return Err(IoCoreError::Failure);
        }
        self.check_range(pos_lb, u64::from(len_lb))?;

        let patches = {
            let pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.index.collect_patches(pos_lb, len_lb)
        };
        let mut buf = vec![0u8; len_lb as usize * LOGICAL_BLOCK_SIZE as usize];
        self.inner.ddev.read_at(pos_lb, &mut buf)?;
        apply_patches(&mut buf, pos_lb, &patches);
        Ok(buf)
    }

    fn check_writable(&self) -> Result<(), IoCoreError> {
        if self.inner.state.test(STATE_FAILURE) {
            return Err(IoCoreError::Failure);
        }
        if self.inner.state.is_read_only() {
            return Err(IoCoreError::ReadOnly);
        }
        Ok(())
    }

    fn check_range(&self, pos_lb: u64, len_lb: u64) -> Result<(), IoCoreError> {
        let size = self.inner.device_size_lb.load(Ordering::Acquire);
        if pos_lb + len_lb > size {
            return Err(IoCoreError::InvalidInput(format!(
                "range [{pos_lb}, {}) exceeds device size {size}",
                pos_lb + len_lb
            )));
        }
        Ok(())
    }

    /// Pause write processing: no new stage work is scheduled, and this
    /// call blocks until every started write has fully retired.
    pub fn freeze(&self) {
        if self
            .inner
            .state
            .n_stoppers
            .fetch_add(1, Ordering::AcqRel)
            == 0
        {
            tracing::info!(name = %self.inner.name, "iocore frozen");
        }
        while self
            .inner
            .state
            .n_started_write_bio
            .load(Ordering::Acquire)
            > 0
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        while self.inner.state.n_pending_gc.load(Ordering::Acquire) > 0 {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Resume write processing.
    pub fn melt(&self) {
        melt_device(&self.inner);
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.state.is_frozen()
    }

    /// Snapshot of the lsid watermark set.
    pub fn lsids(&self) -> Lsids {
        self.inner
            .lsid_state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .lsids
    }

    /// Ring buffer capacity in physical blocks.
    pub fn log_capacity(&self) -> u64 {
        self.inner.ring_buffer_size
    }

    /// `latest - oldest` in physical blocks.
    pub fn log_usage(&self) -> u64 {
        self.lsids().log_usage()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn uuid(&self) -> [u8; 16] {
        self.inner.uuid
    }

    pub fn device_size_lb(&self) -> u64 {
        self.inner.device_size_lb.load(Ordering::Acquire)
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.state.is_read_only()
    }

    pub fn is_log_overflow(&self) -> bool {
        self.inner.state.test(STATE_LOG_OVERFLOW)
    }

    /// Whether the log device can honor flush requests.
    pub fn is_flush_capable(&self) -> bool {
        self.inner.ldev.supports_flush()
    }

    /// Human-readable state summary.
    pub fn status(&self) -> String {
        let mut parts = Vec::new();
        if self.inner.state.is_read_only() {
            parts.push("read-only");
        }
        if self.inner.state.test(STATE_FAILURE) {
            parts.push("failure");
        }
        if self.is_log_overflow() {
            parts.push("log-overflow");
        }
        if self.is_frozen() {
            parts.push("frozen");
        }
        if parts.is_empty() {
            parts.push("active");
        }
        parts.join(",")
    }

    pub fn checkpoint_interval_ms(&self) -> u64 {
        self.inner.checkpoint_interval_ms.load(Ordering::Acquire)
    }

    pub fn set_checkpoint_interval_ms(&self, interval_ms: u64) -> Result<(), IoCoreError> {
        if interval_ms == 0 {
            return Err(IoCoreError::InvalidInput(
                "checkpoint interval must be positive".to_string(),
            ));
        }
        self.inner
            .checkpoint_interval_ms
            .store(interval_ms, Ordering::Release);
        Ok(())
    }

    /// Subscribe to lsid watermark events.
    pub fn subscribe_lsid_events(&self) -> Receiver<LsidEvent> {
        self.inner.events.subscribe()
    }

    /// Advance the oldest retained lsid, shrinking the extractable
    /// window from below and freeing ring space.
    pub fn set_oldest_lsid(&self, lsid: u64) -> Result<(), IoCoreError> {
        let (oldest, written) = {
            let mut track = self.inner.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            if lsid < track.lsids.oldest || lsid > track.lsids.written {
                return Err(IoCoreError::InvalidInput(format!(
                    "oldest lsid {lsid} outside [{}, {}]",
                    track.lsids.oldest, track.lsids.written
                )));
            }
            track.lsids.oldest = lsid;
            (track.lsids.oldest, track.lsids.written)
        };

        let sb = {
            let mut sb = self.inner.superblock.lock().unwrap_or_else(|e| e.into_inner());
            sb.oldest_lsid = oldest;
            sb.written_lsid = written;
            sb.clone()
        };
        write_superblock(self.inner.ldev.as_ref(), &sb, true)?;
        Ok(())
    }

    /// Re-base the WAL: quiesce the pipeline, drop all log content, draw
    /// a fresh salt and clear the overflow condition.
    pub fn reset_wal(&self) -> Result<(), IoCoreError> {
        self.freeze();

        let written = {
            let mut track = self.inner.lsid_state.lock().unwrap_or_else(|e| e.into_inner());
            let written = track.lsids.written;
            // The pipeline is drained, so every accepted write is on
            // both devices.
            debug_assert_eq!(track.lsids.latest, written);
            track.lsids = Lsids::new(written);
            written
        };

        let result = (|| -> Result<(), IoCoreError> {
            {
                let sb = {
                    let mut sb = self.inner.superblock.lock().unwrap_or_else(|e| e.into_inner());
                    sb.oldest_lsid = written;
                    sb.written_lsid = written;
                    sb.clone()
                };
                write_superblock(self.inner.ldev.as_ref(), &sb, true)?;
            }
            let fresh = walb_bdev::reset_wal(self.inner.ldev.as_ref())?;
            self.inner
                .salt
                .store(fresh.log_checksum_salt, Ordering::Release);
            {
                let mut sb = self.inner.superblock.lock().unwrap_or_else(|e| e.into_inner());
                *sb = fresh;
            }
            self.inner.state.clear(STATE_LOG_OVERFLOW);
            tracing::info!(name = %self.inner.name, lsid = written, "WAL reset");
            Ok(())
        })();

        self.melt();
        result
    }

    /// Grow the device. The new size must fit the data device; shrink
    /// is rejected.
    pub fn resize(&self, new_size_lb: u64) -> Result<(), IoCoreError> {
        let current = self.inner.device_size_lb.load(Ordering::Acquire);
        if new_size_lb < current {
            return Err(IoCoreError::InvalidInput(format!(
                "cannot shrink device from {current} to {new_size_lb} blocks"
            )));
        }
        if new_size_lb > self.inner.ddev.size_lb() {
            return Err(IoCoreError::InvalidInput(format!(
                "data device has only {} blocks",
                self.inner.ddev.size_lb()
            )));
        }
        self.inner
            .device_size_lb
            .store(new_size_lb, Ordering::Release);

        let sb = {
            let mut sb = self.inner.superblock.lock().unwrap_or_else(|e| e.into_inner());
            sb.device_size_lb = new_size_lb;
            sb.clone()
        };
        write_superblock(self.inner.ldev.as_ref(), &sb, true)?;
        tracing::info!(name = %self.inner.name, new_size_lb, "device resized");
        Ok(())
    }

    /// Drain all in-flight I/O, stop the workers and persist a final
    /// checkpoint. Runs in a normal blocking context.
    pub fn close(self) -> Result<(), IoCoreError> {
        self.shutdown_impl()
    }

    fn shutdown_impl(&self) -> Result<(), IoCoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Reject new I/O, then make sure queued work gets scheduled
        // even if the device sits frozen.
        self.inner.state.set(STATE_FAILURE);
        enqueue_submit_log_task(&self.inner);
        while self.inner.state.n_pending_bio.load(Ordering::Acquire) > 0 {
            std::thread::sleep(Duration::from_millis(10));
        }

        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.queues.gc_cond.notify_all();
        if let Some(handle) = self
            .gc_worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
        if let Some(handle) = self
            .checkpoint_worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }

        checkpoint::take_checkpoint(&self.inner)?;
        tracing::info!(name = %self.inner.name, "walb device closed");
        Ok(())
    }
}

impl Drop for WalbDevice {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_impl() {
            tracing::error!(name = %self.inner.name, error = %e, "error while closing device");
        }
    }
}

/// Replay valid log in `[written, written + ring)` onto the data
/// device; returns the lsid after the last valid pack.
fn redo_log(
    ldev: &dyn Bdev,
    ddev: &dyn Bdev,
    sb: &Superblock,
    tunables: &Tunables,
) -> Result<u64, IoCoreError> {
    let mut end = sb.written_lsid;
    let mut reader = RingReader::new(ldev, sb, sb.written_lsid, sb.written_lsid + sb.ring_buffer_size);
    loop {
        match reader.next_pack() {
            Ok(Some(pack)) => {
                apply_pack(ddev, &pack, tunables.discard_policy)?;
                end = pack.header.next_lsid();
            }
            Ok(None) => break,
            // The first invalid pack is the crash point; everything
            // before it has been applied.
            Err(_) => break,
        }
    }
    if end != sb.written_lsid {
        ddev.flush().map_err(IoCoreError::Bdev)?;
    }
    Ok(end)
}
