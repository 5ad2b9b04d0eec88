// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-session bookkeeping for the branch manager.
//!
//! A session owns the ordered list of its branches, the current-branch
//! pointer (singular by invariant), the count of non-terminal branches, and
//! a token bucket limiting branch creation. Everything that changes the
//! current branch happens under the session's lock.

use std::time::Instant;

/// Token bucket refilled continuously at `per_minute / 60` tokens per
/// second. A capacity of 0 disables the limit.
pub(crate) struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available. Disabled buckets always grant.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.capacity == 0.0 {
            return true;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Mutable state of one agent session. Branch records themselves live in
/// the repository; this is only the bookkeeping that must change atomically
/// with the current-branch pointer.
pub(crate) struct SessionState {
    /// The at-most-one Active branch receiving subsequent tool calls.
    pub(crate) current: Option<String>,
    /// Non-terminal branches (active + transitioning).
    pub(crate) active: usize,
    /// Session-end tombstone; all further branch_* calls fail NotFound.
    pub(crate) ended: bool,
    pub(crate) bucket: TokenBucket,
}

impl SessionState {
    pub(crate) fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            current: None,
            active: 0,
            ended: false,
            bucket: TokenBucket::new(rate_limit_per_minute),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_starts_full() {
        let mut b = TokenBucket::new(3);
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(!b.try_acquire());
    }

    #[test]
    fn zero_capacity_disables_the_limit() {
        let mut b = TokenBucket::new(0);
        for _ in 0..100 {
            assert!(b.try_acquire());
        }
    }

    #[test]
    fn bucket_refills_over_time() {
        let mut b = TokenBucket::new(60); // 1 token per second
        while b.try_acquire() {}
        assert!(!b.try_acquire());
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(b.try_acquire());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let mut b = TokenBucket::new(2);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(b.try_acquire());
        assert!(b.try_acquire());
        assert!(!b.try_acquire());
    }

    #[test]
    fn new_session_state_is_empty() {
        let s = SessionState::new(5);
        assert!(s.current.is_none());
        assert_eq!(s.active, 0);
        assert!(!s.ended);
    }
}
