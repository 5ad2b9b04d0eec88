// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-branch wall-clock deadlines.
//!
//! One cheap sleeper task per armed branch. The contract is task hygiene:
//! no timer task survives branch termination — `cancel` aborts the sleeper,
//! and the manager cancels on every `BranchTerminated` event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{EventBus, FoldEvent};

pub struct TimeoutManager {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    bus: Arc<EventBus>,
}

impl TimeoutManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            bus,
        }
    }

    /// Schedule a `TimeoutExpired` event for `branch_id` after `duration`.
    /// Re-arming an already armed branch replaces the previous deadline.
    pub fn arm(&self, branch_id: &str, duration: Duration) {
        let bus = self.bus.clone();
        let id = branch_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!(branch_id = %id, "branch deadline elapsed");
            bus.publish(FoldEvent::TimeoutExpired { branch_id: id });
        });
        let mut timers = self.timers.lock().expect("timeout manager lock poisoned");
        if let Some(old) = timers.insert(branch_id.to_string(), handle) {
            old.abort();
        }
    }

    /// Stop a scheduled firing. Idempotent; unknown ids are a no-op.
    pub fn cancel(&self, branch_id: &str) {
        let handle = self
            .timers
            .lock()
            .expect("timeout manager lock poisoned")
            .remove(branch_id);
        if let Some(h) = handle {
            h.abort();
        }
    }

    /// Number of timers whose task is still pending. Fired and cancelled
    /// timers do not count.
    pub fn armed_count(&self) -> usize {
        self.timers
            .lock()
            .expect("timeout manager lock poisoned")
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn armed_timer_publishes_timeout_event() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let tm = TimeoutManager::new(bus);
        tm.arm("b1", Duration::from_millis(20));
        let ev = rx.recv().await.unwrap();
        match ev {
            FoldEvent::TimeoutExpired { branch_id } => assert_eq!(branch_id, "b1"),
            other => panic!("expected TimeoutExpired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let tm = TimeoutManager::new(bus);
        tm.arm("b1", Duration::from_millis(30));
        tm.cancel("b1");
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(tm.armed_count(), 0);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_tolerates_unknown_ids() {
        let bus = Arc::new(EventBus::new());
        let tm = TimeoutManager::new(bus);
        tm.arm("b1", Duration::from_millis(30));
        tm.cancel("b1");
        tm.cancel("b1");
        tm.cancel("never-armed");
    }

    #[tokio::test]
    async fn rearming_replaces_the_previous_deadline() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let tm = TimeoutManager::new(bus);
        tm.arm("b1", Duration::from_millis(10));
        tm.arm("b1", Duration::from_millis(60));
        // The first (aborted) timer must not fire at ~10ms.
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(rx.try_recv().is_err());
        // The replacement fires.
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.branch_id(), "b1");
    }

    #[tokio::test]
    async fn independent_branches_fire_independently() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let tm = TimeoutManager::new(bus);
        tm.arm("fast", Duration::from_millis(10));
        tm.arm("slow", Duration::from_millis(40));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.branch_id(), "fast");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.branch_id(), "slow");
    }
}
