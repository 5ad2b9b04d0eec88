// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FoldError;

/// Upper bound on `Branch::description`.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Upper bound on `Branch::prompt`.
pub const MAX_PROMPT_LEN: usize = 10_000;

/// Lifecycle state of a branch.
///
/// ```text
///  Created ──► Active ──► Completed
///                  │
///                  ├──► BudgetExhausted
///                  ├──► TimedOut
///                  ├──► ForceReturned
///                  └──► Failed
/// ```
///
/// Terminal states never transition again. `Created` exists only inside
/// `branch_create`; externally a branch is first observable as `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Created,
    Active,
    Completed,
    BudgetExhausted,
    TimedOut,
    ForceReturned,
    Failed,
}

impl BranchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BranchStatus::Created | BranchStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BranchStatus::Created => "created",
            BranchStatus::Active => "active",
            BranchStatus::Completed => "completed",
            BranchStatus::BudgetExhausted => "budget_exhausted",
            BranchStatus::TimedOut => "timed_out",
            BranchStatus::ForceReturned => "force_returned",
            BranchStatus::Failed => "failed",
        }
    }

    fn can_transition_to(self, next: BranchStatus) -> bool {
        match self {
            BranchStatus::Created => matches!(next, BranchStatus::Active),
            BranchStatus::Active => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded sub-context the agent delegates to.
///
/// Owned exclusively by the [`BranchRepository`][crate::BranchRepository];
/// everything outside the repository sees deep clones.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: String,
    pub session_id: String,
    /// None when the branch sits directly under the session root.
    pub parent_id: Option<String>,
    pub depth: u32,
    /// Human label; doubles as the memory-injection query.
    pub description: String,
    /// Seed instruction given to the branch; never re-injected into the parent.
    pub prompt: String,
    pub budget_total: u64,
    /// Final value is written on the terminal transition; the live counter
    /// lives in the budget tracker until then.
    pub budget_used: u64,
    pub timeout_deadline: Option<DateTime<Utc>>,
    pub status: BranchStatus,
    /// Scrubbed return message. Set exactly once, on a terminal transition
    /// that carries a result (every terminal state except `Failed`).
    pub result: Option<String>,
    /// Set when status is `Failed` or `ForceReturned`.
    pub error: Option<String>,
    pub injected_memory_ids: Vec<String>,
    /// Retrieval degraded or failed; the branch started without memories.
    pub injection_warning: bool,
    /// Background injection has not finished yet.
    pub injection_pending: bool,
    /// At most one branch per session is current at any instant.
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Branch {
    /// Apply a state transition, enforcing the lifecycle diagram.
    ///
    /// Terminal transitions also stamp `completed_at`. Attempts to leave a
    /// terminal state fail with `AlreadyCompleted` carrying the standing
    /// status; other illegal moves fail with `InvalidTransition`.
    pub fn transition(&mut self, next: BranchStatus) -> Result<(), FoldError> {
        if self.status.is_terminal() {
            return Err(FoldError::AlreadyCompleted {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(FoldError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(status: BranchStatus) -> Branch {
        Branch {
            id: "b1".into(),
            session_id: "S".into(),
            parent_id: None,
            depth: 0,
            description: "test".into(),
            prompt: String::new(),
            budget_total: 1000,
            budget_used: 0,
            timeout_deadline: None,
            status,
            result: None,
            error: None,
            injected_memory_ids: Vec::new(),
            injection_warning: false,
            injection_pending: false,
            is_current: true,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    // ── Terminal predicate ───────────────────────────────────────────────────

    #[test]
    fn created_and_active_are_not_terminal() {
        assert!(!BranchStatus::Created.is_terminal());
        assert!(!BranchStatus::Active.is_terminal());
    }

    #[test]
    fn all_end_states_are_terminal() {
        for s in [
            BranchStatus::Completed,
            BranchStatus::BudgetExhausted,
            BranchStatus::TimedOut,
            BranchStatus::ForceReturned,
            BranchStatus::Failed,
        ] {
            assert!(s.is_terminal(), "{s} must be terminal");
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    #[test]
    fn created_to_active_is_allowed() {
        let mut b = branch(BranchStatus::Created);
        b.transition(BranchStatus::Active).unwrap();
        assert_eq!(b.status, BranchStatus::Active);
        assert!(b.completed_at.is_none());
    }

    #[test]
    fn created_cannot_jump_to_terminal() {
        let mut b = branch(BranchStatus::Created);
        let err = b.transition(BranchStatus::Completed).unwrap_err();
        assert!(matches!(err, FoldError::InvalidTransition { .. }));
    }

    #[test]
    fn active_to_each_terminal_is_allowed() {
        for terminal in [
            BranchStatus::Completed,
            BranchStatus::BudgetExhausted,
            BranchStatus::TimedOut,
            BranchStatus::ForceReturned,
            BranchStatus::Failed,
        ] {
            let mut b = branch(BranchStatus::Active);
            b.transition(terminal).unwrap();
            assert_eq!(b.status, terminal);
            assert!(b.completed_at.is_some());
        }
    }

    #[test]
    fn terminal_states_never_transition() {
        let mut b = branch(BranchStatus::Completed);
        let err = b.transition(BranchStatus::Active).unwrap_err();
        match err {
            FoldError::AlreadyCompleted { status } => {
                assert_eq!(status, BranchStatus::Completed)
            }
            other => panic!("expected AlreadyCompleted, got {other:?}"),
        }
    }

    #[test]
    fn second_terminal_transition_reports_first_winner() {
        let mut b = branch(BranchStatus::Active);
        b.transition(BranchStatus::TimedOut).unwrap();
        let err = b.transition(BranchStatus::Completed).unwrap_err();
        match err {
            FoldError::AlreadyCompleted { status } => {
                assert_eq!(status, BranchStatus::TimedOut)
            }
            other => panic!("expected AlreadyCompleted, got {other:?}"),
        }
    }

    // ── Display / serde ──────────────────────────────────────────────────────

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(BranchStatus::BudgetExhausted.to_string(), "budget_exhausted");
        assert_eq!(BranchStatus::TimedOut.to_string(), "timed_out");
        assert_eq!(BranchStatus::ForceReturned.to_string(), "force_returned");
    }

    #[test]
    fn status_serializes_to_snake_case() {
        let json = serde_json::to_string(&BranchStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }
}
