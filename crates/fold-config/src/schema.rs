// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldConfig {
    #[serde(default)]
    pub folding: FoldingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub scrub: ScrubConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Branch lifecycle knobs: depth, budgets, timeouts, retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldingConfig {
    /// Branch creation at depth ≥ this value is rejected.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Upper bound on the per-branch token budget a caller may request.
    #[serde(default = "default_max_budget")]
    pub max_budget: u64,
    /// Budget used when a `branch_create` request omits one.
    #[serde(default = "default_budget")]
    pub default_budget: u64,
    /// Upper bound on the per-branch timeout a caller may request.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    /// Timeout used when a `branch_create` request omits one. 0 disables.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    /// How long terminal branches remain queryable before the sweeper
    /// deletes them.
    #[serde(default = "default_terminal_ttl_seconds")]
    pub terminal_ttl_seconds: u64,
}

/// Memory-injection knobs for newly created branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Fraction of a branch's budget available to injected items.
    #[serde(default = "default_injection_budget_ratio")]
    pub injection_budget_ratio: f64,
    /// Minimum confidence for an item to be considered for injection.
    #[serde(default = "default_min_confidence")]
    pub memory_min_confidence: f64,
    /// Maximum number of items fetched per retrieval.
    #[serde(default = "default_max_items")]
    pub memory_max_items: usize,
    /// How long `branch_create` may block on retrieval before the
    /// injection continues in the background.
    #[serde(default = "default_injection_soft_deadline_ms")]
    pub injection_soft_deadline_ms: u64,
    /// Hard deadline for the background injection task.
    #[serde(default = "default_injection_hard_deadline_ms")]
    pub injection_hard_deadline_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrubConfig {
    /// Deadline for a single scrubber call on branch egress.
    #[serde(default = "default_scrub_timeout_ms")]
    pub scrub_timeout_ms: u64,
}

/// Concurrency and rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cap on non-terminal branches per session.
    #[serde(default = "default_max_active_per_session")]
    pub max_active_branches_per_session: usize,
    /// Cap on non-terminal branches process-wide.
    #[serde(default = "default_max_active_per_process")]
    pub max_active_branches_per_process: usize,
    /// Token-bucket rate limit on branch creation, per session.
    #[serde(default = "default_rate_limit_per_minute")]
    pub branch_rate_limit_per_minute: u32,
}

fn default_max_depth() -> u32 {
    3
}
fn default_max_budget() -> u64 {
    32_768
}
fn default_budget() -> u64 {
    8_192
}
fn default_max_timeout_seconds() -> u64 {
    600
}
fn default_timeout_seconds() -> u64 {
    300
}
fn default_terminal_ttl_seconds() -> u64 {
    3_600
}
fn default_injection_budget_ratio() -> f64 {
    0.20
}
fn default_min_confidence() -> f64 {
    0.70
}
fn default_max_items() -> usize {
    10
}
fn default_injection_soft_deadline_ms() -> u64 {
    200
}
fn default_injection_hard_deadline_ms() -> u64 {
    2_000
}
fn default_scrub_timeout_ms() -> u64 {
    5_000
}
fn default_max_active_per_session() -> usize {
    10
}
fn default_max_active_per_process() -> usize {
    100
}
fn default_rate_limit_per_minute() -> u32 {
    5
}

impl Default for FoldingConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_budget: default_max_budget(),
            default_budget: default_budget(),
            max_timeout_seconds: default_max_timeout_seconds(),
            default_timeout_seconds: default_timeout_seconds(),
            terminal_ttl_seconds: default_terminal_ttl_seconds(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            injection_budget_ratio: default_injection_budget_ratio(),
            memory_min_confidence: default_min_confidence(),
            memory_max_items: default_max_items(),
            injection_soft_deadline_ms: default_injection_soft_deadline_ms(),
            injection_hard_deadline_ms: default_injection_hard_deadline_ms(),
        }
    }
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            scrub_timeout_ms: default_scrub_timeout_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_active_branches_per_session: default_max_active_per_session(),
            max_active_branches_per_process: default_max_active_per_process(),
            branch_rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = FoldConfig::default();
        assert_eq!(cfg.folding.max_depth, 3);
        assert_eq!(cfg.folding.max_budget, 32_768);
        assert_eq!(cfg.folding.default_budget, 8_192);
        assert_eq!(cfg.folding.max_timeout_seconds, 600);
        assert_eq!(cfg.folding.default_timeout_seconds, 300);
        assert_eq!(cfg.folding.terminal_ttl_seconds, 3_600);
        assert_eq!(cfg.limits.max_active_branches_per_session, 10);
        assert_eq!(cfg.limits.max_active_branches_per_process, 100);
        assert_eq!(cfg.limits.branch_rate_limit_per_minute, 5);
        assert_eq!(cfg.scrub.scrub_timeout_ms, 5_000);
    }

    #[test]
    fn memory_defaults() {
        let cfg = MemoryConfig::default();
        assert!((cfg.injection_budget_ratio - 0.20).abs() < f64::EPSILON);
        assert!((cfg.memory_min_confidence - 0.70).abs() < f64::EPSILON);
        assert_eq!(cfg.memory_max_items, 10);
        assert_eq!(cfg.injection_soft_deadline_ms, 200);
        assert_eq!(cfg.injection_hard_deadline_ms, 2_000);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let cfg: FoldConfig = serde_yaml::from_str("folding:\n  max_depth: 5\n").unwrap();
        assert_eq!(cfg.folding.max_depth, 5);
        assert_eq!(cfg.folding.default_budget, 8_192);
        assert_eq!(cfg.limits.branch_rate_limit_per_minute, 5);
    }

    #[test]
    fn round_trips_through_yaml() {
        let cfg = FoldConfig::default();
        let text = serde_yaml::to_string(&cfg).unwrap();
        let back: FoldConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.folding.max_budget, cfg.folding.max_budget);
        assert_eq!(back.memory.memory_max_items, cfg.memory.memory_max_items);
    }
}
