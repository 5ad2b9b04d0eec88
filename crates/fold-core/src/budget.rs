// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-branch token accounting.
//!
//! Consumption is all-or-nothing: an increment that would exceed the budget
//! is rejected outright and the counter keeps its previous value. The
//! tracker never calls into the branch manager; it publishes
//! [`FoldEvent::BudgetWarning`] and [`FoldEvent::BudgetExhausted`] on the
//! event bus and the manager reacts from there.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::FoldError;
use crate::events::{EventBus, FoldEvent};

/// Fraction of the budget at which the one-shot warning fires.
const WARNING_NUMERATOR: u128 = 4;
const WARNING_DENOMINATOR: u128 = 5;

struct Account {
    total: u64,
    used: AtomicU64,
    warned: AtomicBool,
}

pub struct BudgetTracker {
    accounts: RwLock<HashMap<String, Arc<Account>>>,
    bus: Arc<EventBus>,
}

impl BudgetTracker {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Initialize accounting for a branch.
    pub fn allocate(&self, branch_id: &str, total: u64) -> Result<(), FoldError> {
        let mut accounts = self.accounts.write().expect("budget tracker lock poisoned");
        if accounts.contains_key(branch_id) {
            return Err(FoldError::Duplicate(branch_id.to_string()));
        }
        accounts.insert(
            branch_id.to_string(),
            Arc::new(Account {
                total,
                used: AtomicU64::new(0),
                warned: AtomicBool::new(false),
            }),
        );
        Ok(())
    }

    /// Atomically add `tokens` to the branch's usage.
    ///
    /// Returns the remaining budget on success. If the addition would
    /// exceed the total, nothing is consumed, a `BudgetExhausted` event is
    /// published, and `FoldError::BudgetExhausted` is returned.
    pub fn consume(&self, branch_id: &str, tokens: u64) -> Result<u64, FoldError> {
        let account = self
            .account(branch_id)
            .ok_or_else(|| FoldError::NotFound(branch_id.to_string()))?;

        let mut current = account.used.load(Ordering::Acquire);
        loop {
            let proposed = current.saturating_add(tokens);
            if proposed > account.total {
                self.bus.publish(FoldEvent::BudgetExhausted {
                    branch_id: branch_id.to_string(),
                    used: current,
                    total: account.total,
                });
                return Err(FoldError::BudgetExhausted {
                    used: current,
                    total: account.total,
                });
            }
            match account.used.compare_exchange(
                current,
                proposed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.maybe_warn(branch_id, &account, proposed);
                    return Ok(account.total - proposed);
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Remaining tokens, or None when no accounting exists for the id.
    pub fn remaining(&self, branch_id: &str) -> Option<u64> {
        let account = self.account(branch_id)?;
        Some(account.total - account.used.load(Ordering::Acquire))
    }

    /// Tokens consumed so far, or None when no accounting exists.
    pub fn used(&self, branch_id: &str) -> Option<u64> {
        let account = self.account(branch_id)?;
        Some(account.used.load(Ordering::Acquire))
    }

    /// Remove accounting on terminal transition. Idempotent.
    pub fn deallocate(&self, branch_id: &str) {
        self.accounts
            .write()
            .expect("budget tracker lock poisoned")
            .remove(branch_id);
    }

    pub fn contains(&self, branch_id: &str) -> bool {
        self.accounts
            .read()
            .expect("budget tracker lock poisoned")
            .contains_key(branch_id)
    }

    fn account(&self, branch_id: &str) -> Option<Arc<Account>> {
        self.accounts
            .read()
            .expect("budget tracker lock poisoned")
            .get(branch_id)
            .cloned()
    }

    fn maybe_warn(&self, branch_id: &str, account: &Account, used: u64) {
        let crossed = (used as u128) * WARNING_DENOMINATOR
            >= (account.total as u128) * WARNING_NUMERATOR;
        if crossed && !account.warned.swap(true, Ordering::AcqRel) {
            self.bus.publish(FoldEvent::BudgetWarning {
                branch_id: branch_id.to_string(),
                used,
                total: account.total,
            });
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (BudgetTracker, tokio::sync::mpsc::UnboundedReceiver<FoldEvent>) {
        let bus = Arc::new(EventBus::new());
        let rx = bus.subscribe();
        (BudgetTracker::new(bus), rx)
    }

    // ── Allocation ───────────────────────────────────────────────────────────

    #[test]
    fn allocate_then_remaining_reports_full_budget() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        assert_eq!(t.remaining("b1"), Some(100));
        assert_eq!(t.used("b1"), Some(0));
    }

    #[test]
    fn double_allocate_is_rejected() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        assert!(matches!(t.allocate("b1", 50), Err(FoldError::Duplicate(_))));
    }

    #[test]
    fn consume_on_unknown_branch_is_not_found() {
        let (t, _rx) = tracker();
        assert!(matches!(t.consume("ghost", 1), Err(FoldError::NotFound(_))));
    }

    // ── Consumption ──────────────────────────────────────────────────────────

    #[test]
    fn consume_accumulates_and_reports_remaining() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        assert_eq!(t.consume("b1", 30).unwrap(), 70);
        assert_eq!(t.consume("b1", 30).unwrap(), 40);
        assert_eq!(t.used("b1"), Some(60));
    }

    #[test]
    fn consume_up_to_exact_total_succeeds() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        assert_eq!(t.consume("b1", 100).unwrap(), 0);
    }

    #[test]
    fn overrun_is_rejected_without_partial_consumption() {
        let (t, mut rx) = tracker();
        t.allocate("b1", 100).unwrap();
        t.consume("b1", 80).unwrap();
        let err = t.consume("b1", 30).unwrap_err();
        match err {
            FoldError::BudgetExhausted { used, total } => {
                assert_eq!(used, 80);
                assert_eq!(total, 100);
            }
            other => panic!("expected BudgetExhausted, got {other:?}"),
        }
        // Usage unchanged by the rejected consume.
        assert_eq!(t.used("b1"), Some(80));
        // Both the 80% warning and the exhaustion event were published.
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind());
        }
        assert_eq!(kinds, ["budget_warning", "budget_exhausted"]);
    }

    // ── Warning threshold ────────────────────────────────────────────────────

    #[test]
    fn warning_fires_once_at_eighty_percent() {
        let (t, mut rx) = tracker();
        t.allocate("b1", 100).unwrap();
        t.consume("b1", 79).unwrap();
        assert!(rx.try_recv().is_err());
        t.consume("b1", 1).unwrap();
        match rx.try_recv().unwrap() {
            FoldEvent::BudgetWarning { used, total, .. } => {
                assert_eq!(used, 80);
                assert_eq!(total, 100);
            }
            other => panic!("expected warning, got {other:?}"),
        }
        // Further consumption does not re-warn.
        t.consume("b1", 10).unwrap();
        assert!(rx.try_recv().is_err());
    }

    // ── Concurrency ──────────────────────────────────────────────────────────

    #[test]
    fn concurrent_overrun_admits_exactly_one() {
        // budget 100, two concurrent consumes of 60: one wins, one is
        // rejected, usage ends at 60.
        for _ in 0..50 {
            let bus = Arc::new(EventBus::new());
            let t = Arc::new(BudgetTracker::new(bus));
            t.allocate("b1", 100).unwrap();
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let mut handles = Vec::new();
            for _ in 0..2 {
                let t = t.clone();
                let barrier = barrier.clone();
                handles.push(std::thread::spawn(move || {
                    barrier.wait();
                    t.consume("b1", 60).is_ok()
                }));
            }
            let outcomes: Vec<bool> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
            assert_eq!(t.used("b1"), Some(60));
        }
    }

    #[test]
    fn concurrent_small_consumes_never_exceed_total() {
        let bus = Arc::new(EventBus::new());
        let t = Arc::new(BudgetTracker::new(bus));
        t.allocate("b1", 1000).unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = t.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    let _ = t.consume("b1", 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(t.used("b1"), Some(1000));
    }

    // ── Deallocation ─────────────────────────────────────────────────────────

    #[test]
    fn deallocate_removes_accounting() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        t.deallocate("b1");
        assert!(!t.contains("b1"));
        assert_eq!(t.remaining("b1"), None);
    }

    #[test]
    fn deallocate_is_idempotent() {
        let (t, _rx) = tracker();
        t.allocate("b1", 100).unwrap();
        t.deallocate("b1");
        t.deallocate("b1");
        assert!(!t.contains("b1"));
    }
}
