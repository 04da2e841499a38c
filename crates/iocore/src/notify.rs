// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lsid watermark notification
//!
//! The kernel driver exposes a poll-able `lsids` sysfs file; the
//! in-process equivalent is a subscription hub. An edge event fires on
//! the transition `permanent - oldest: 0 -> >0`, i.e. whenever durable
//! log first appears beyond the oldest retained lsid.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LsidEvent {
    /// `permanent - oldest` transitioned from zero to non-zero.
    PermanentLogNonEmpty,
}

#[derive(Default)]
pub struct LsidEventHub {
    subscribers: Mutex<Vec<Sender<LsidEvent>>>,
}

impl LsidEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to lsid events. The receiver sees every event
    /// published after this call.
    pub fn subscribe(&self) -> Receiver<LsidEvent> {
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Publish to all live subscribers, dropping closed ones.
    pub fn publish(&self, event: LsidEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events() {
        let hub = LsidEventHub::new();
        let rx1 = hub.subscribe();
        let rx2 = hub.subscribe();

        hub.publish(LsidEvent::PermanentLogNonEmpty);

        assert_eq!(rx1.try_recv().unwrap(), LsidEvent::PermanentLogNonEmpty);
        assert_eq!(rx2.try_recv().unwrap(), LsidEvent::PermanentLogNonEmpty);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = LsidEventHub::new();
        let rx = hub.subscribe();
        drop(rx);
        let _rx2 = hub.subscribe();

        hub.publish(LsidEvent::PermanentLogNonEmpty);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn events_before_subscription_are_not_seen() {
        let hub = LsidEventHub::new();
        hub.publish(LsidEvent::PermanentLogNonEmpty);
        let rx = hub.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
