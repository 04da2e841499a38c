// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The owned stage queues
//!
//! Wrappers and packs move between pipeline stages by ownership
//! transfer through these queues: log-submit (wrappers), log-wait
//! (packs), data-submit and data-wait (wrappers), and GC (packs). Each
//! queue has its own short-lived lock; no lock is held across disk I/O.

use crate::pack::Pack;
use crate::wrapper::BioWrapper;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Default)]
pub struct StageQueues {
    pub log_submit: Mutex<VecDeque<Arc<BioWrapper>>>,
    pub log_wait: Mutex<VecDeque<Pack>>,
    pub data_submit: Mutex<VecDeque<Arc<BioWrapper>>>,
    pub data_wait: Mutex<VecDeque<Arc<BioWrapper>>>,
    pub gc: Mutex<VecDeque<Pack>>,
    /// Wakes the GC worker when packs arrive (or at shutdown).
    pub gc_cond: Condvar,
}

impl StageQueues {
    pub fn new() -> Self {
        Self::default()
    }
}
