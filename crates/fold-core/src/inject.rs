// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Scope-aware memory injection at branch birth.
//!
//! Retrieval cascades project → team → org (most specific first), items are
//! de-duplicated by id across scopes, and the surviving list is greedily
//! packed into the branch's injection budget slice in retrieval order —
//! packing stops at the first item that does not fit, without reordering.
//!
//! Injection is ambient and non-fatal: the branch starts whether or not
//! retrieval succeeds, and a slow engine only delays the provenance fields
//! on the branch record, never the create call past its soft deadline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fold_memory::{MemoryError, MemoryItem, MemoryRetrieval, MemoryScope};
use tracing::{debug, warn};

use crate::repository::BranchRepository;

#[derive(Debug, Clone)]
pub struct InjectorConfig {
    pub min_confidence: f64,
    pub max_items: usize,
    /// Fraction of the branch budget available to injected items.
    pub budget_ratio: f64,
    /// Hard deadline for the whole retrieval cascade.
    pub hard_deadline: Duration,
}

impl From<&fold_config::FoldConfig> for InjectorConfig {
    fn from(cfg: &fold_config::FoldConfig) -> Self {
        Self {
            min_confidence: cfg.memory.memory_min_confidence,
            max_items: cfg.memory.memory_max_items,
            budget_ratio: cfg.memory.injection_budget_ratio,
            hard_deadline: Duration::from_millis(cfg.memory.injection_hard_deadline_ms),
        }
    }
}

/// The packed injection bundle for one branch.
#[derive(Debug, Clone, Default)]
pub struct InjectionPlan {
    pub items: Vec<MemoryItem>,
}

impl InjectionPlan {
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    pub fn token_cost(&self) -> u64 {
        self.items.iter().map(|i| i.estimated_tokens).sum()
    }
}

pub struct MemoryInjector {
    retrieval: Arc<dyn MemoryRetrieval>,
    config: InjectorConfig,
}

impl MemoryInjector {
    pub fn new(retrieval: Arc<dyn MemoryRetrieval>, config: InjectorConfig) -> Self {
        Self { retrieval, config }
    }

    /// Retrieve and pack items for a branch with `budget_total` tokens.
    pub async fn plan(
        &self,
        query: &str,
        budget_total: u64,
    ) -> Result<InjectionPlan, MemoryError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<MemoryItem> = Vec::new();

        for scope in MemoryScope::CASCADE {
            let items = self
                .retrieval
                .search(query, scope, self.config.min_confidence, self.config.max_items)
                .await?;
            for item in items {
                if seen.insert(item.id.clone()) {
                    merged.push(item);
                }
            }
        }
        merged.truncate(self.config.max_items);

        let injection_budget =
            (budget_total as f64 * self.config.budget_ratio).floor() as u64;
        let mut remaining = injection_budget;
        let mut packed = Vec::new();
        for item in merged {
            if item.estimated_tokens > remaining {
                break;
            }
            remaining -= item.estimated_tokens;
            packed.push(item);
        }

        Ok(InjectionPlan { items: packed })
    }

    /// Full injection pass for a freshly created branch: retrieve under the
    /// hard deadline, then record the outcome on the branch.
    ///
    /// Runs on its own task; the create call only waits for it up to the
    /// soft deadline. All failure modes degrade to a warning flag on the
    /// branch — the branch itself is already running.
    pub async fn run(
        &self,
        repo: Arc<BranchRepository>,
        branch_id: String,
        query: String,
        budget_total: u64,
    ) {
        let outcome =
            tokio::time::timeout(self.config.hard_deadline, self.plan(&query, budget_total))
                .await;

        let (ids, warning) = match outcome {
            Ok(Ok(plan)) => {
                debug!(
                    branch_id = %branch_id,
                    items = plan.items.len(),
                    tokens = plan.token_cost(),
                    "memory injection complete"
                );
                (plan.ids(), false)
            }
            Ok(Err(e)) => {
                warn!(branch_id = %branch_id, error = %e, "memory retrieval failed, branch starts without memories");
                (Vec::new(), true)
            }
            Err(_) => {
                warn!(branch_id = %branch_id, "memory retrieval missed hard deadline, branch starts without memories");
                (Vec::new(), true)
            }
        };

        // The branch may already be gone (terminated and swept); that is fine.
        let _ = repo.update(&branch_id, |b| {
            b.injected_memory_ids = ids.clone();
            b.injection_warning = warning;
            b.injection_pending = false;
            Ok(())
        });
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
