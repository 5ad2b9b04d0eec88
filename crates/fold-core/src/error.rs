// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

use crate::branch::BranchStatus;

/// Error taxonomy of the folding core.
///
/// Only validation, limit, identity, scrub and internal errors reach the
/// agent; budget exhaustion and timeouts surface as terminal statuses on the
/// branch instead. `code()` yields the stable wire identifier used in tool
/// error payloads.
#[derive(Debug, Error)]
pub enum FoldError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("maximum branch depth ({0}) exceeded")]
    MaxDepthExceeded(u32),

    #[error("too many concurrent branches: {0}")]
    TooManyConcurrentBranches(String),

    #[error("branch creation rate limit exceeded for session {0}")]
    RateLimited(String),

    #[error("branch not found: {0}")]
    NotFound(String),

    #[error("branch already exists: {0}")]
    Duplicate(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: BranchStatus,
        to: BranchStatus,
    },

    #[error("branch already completed with status {status}")]
    AlreadyCompleted { status: BranchStatus },

    #[error("budget exhausted: {used} of {total} tokens used")]
    BudgetExhausted { used: u64, total: u64 },

    #[error("scrub failed: {0}")]
    ScrubFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FoldError {
    /// Stable wire code for tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            FoldError::InvalidInput(_) => "err_invalid_input",
            FoldError::MaxDepthExceeded(_) => "err_max_depth_exceeded",
            FoldError::TooManyConcurrentBranches(_) => "err_too_many_concurrent_branches",
            FoldError::RateLimited(_) => "err_rate_limited",
            FoldError::NotFound(_) => "err_not_found",
            FoldError::Duplicate(_) => "err_duplicate",
            FoldError::InvalidTransition { .. } => "err_invalid_transition",
            FoldError::AlreadyCompleted { .. } => "err_already_completed",
            FoldError::BudgetExhausted { .. } => "err_budget_exhausted",
            FoldError::ScrubFailed(_) => "err_scrub_failed",
            FoldError::Internal(_) => "err_internal",
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(FoldError::NotFound("x".into()).code(), "err_not_found");
        assert_eq!(
            FoldError::AlreadyCompleted {
                status: BranchStatus::TimedOut
            }
            .code(),
            "err_already_completed"
        );
        assert_eq!(
            FoldError::ScrubFailed("engine".into()).code(),
            "err_scrub_failed"
        );
    }

    #[test]
    fn already_completed_message_names_the_winner() {
        let err = FoldError::AlreadyCompleted {
            status: BranchStatus::TimedOut,
        };
        assert!(err.to_string().contains("timed_out"));
    }

    #[test]
    fn budget_exhausted_message_carries_counts() {
        let err = FoldError::BudgetExhausted {
            used: 80,
            total: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("80"));
        assert!(msg.contains("100"));
    }
}
