// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-process event bus between the folding components.
//!
//! The bus exists to break the cycle between budget tracking and lifecycle
//! management: the tracker publishes, the manager reacts. Neither holds a
//! reference to the other.
//!
//! Ordering: `publish` serializes all emissions under one lock and every
//! subscriber owns an ordered channel, so events for a single branch id are
//! delivered to each subscriber in emission order. Cross-branch ordering is
//! unspecified. Delivery is at-least-once within the process; consumers are
//! idempotent by (branch id, event kind).

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::branch::BranchStatus;

/// Events flowing between the budget tracker, timeout manager and the
/// branch manager.
#[derive(Debug, Clone)]
pub enum FoldEvent {
    /// Usage crossed 80% of the budget (emitted once per branch).
    BudgetWarning {
        branch_id: String,
        used: u64,
        total: u64,
    },
    /// An attempted consume would have exceeded the budget; the branch
    /// must terminate.
    BudgetExhausted {
        branch_id: String,
        used: u64,
        total: u64,
    },
    /// The branch's wall-clock deadline elapsed.
    TimeoutExpired { branch_id: String },
    /// The branch reached a terminal state; trackers clean up on this.
    BranchTerminated {
        branch_id: String,
        status: BranchStatus,
    },
}

impl FoldEvent {
    pub fn branch_id(&self) -> &str {
        match self {
            FoldEvent::BudgetWarning { branch_id, .. }
            | FoldEvent::BudgetExhausted { branch_id, .. }
            | FoldEvent::TimeoutExpired { branch_id }
            | FoldEvent::BranchTerminated { branch_id, .. } => branch_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FoldEvent::BudgetWarning { .. } => "budget_warning",
            FoldEvent::BudgetExhausted { .. } => "budget_exhausted",
            FoldEvent::TimeoutExpired { .. } => "timeout_expired",
            FoldEvent::BranchTerminated { .. } => "branch_terminated",
        }
    }
}

/// Single-process publish/subscribe fan-out.
///
/// Publishing never blocks: subscriber channels are unbounded and handlers
/// drain them on their own tasks. A subscriber whose receiver was dropped
/// is pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<FoldEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<FoldEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, in subscription order.
    pub fn publish(&self, event: FoldEvent) {
        let mut subs = self.subscribers.lock().expect("event bus lock poisoned");
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .len()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(id: &str, used: u64) -> FoldEvent {
        FoldEvent::BudgetWarning {
            branch_id: id.into(),
            used,
            total: 100,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(FoldEvent::TimeoutExpired {
            branch_id: "b1".into(),
        });
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.branch_id(), "b1");
        assert_eq!(ev.kind(), "timeout_expired");
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        for used in [10, 20, 30] {
            bus.publish(warning("b1", used));
        }
        for expected in [10u64, 20, 30] {
            match rx.recv().await.unwrap() {
                FoldEvent::BudgetWarning { used, .. } => assert_eq!(used, expected),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn all_subscribers_receive_each_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(warning("b1", 80));
        assert_eq!(a.recv().await.unwrap().branch_id(), "b1");
        assert_eq!(b.recv().await.unwrap().branch_id(), "b1");
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        bus.publish(warning("b1", 1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn branch_id_accessor_covers_all_variants() {
        let events = [
            warning("x", 1),
            FoldEvent::BudgetExhausted {
                branch_id: "x".into(),
                used: 1,
                total: 1,
            },
            FoldEvent::TimeoutExpired {
                branch_id: "x".into(),
            },
            FoldEvent::BranchTerminated {
                branch_id: "x".into(),
                status: BranchStatus::Completed,
            },
        ];
        for ev in &events {
            assert_eq!(ev.branch_id(), "x");
        }
    }
}
