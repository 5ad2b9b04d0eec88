// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `fold-memory` — reasoning-memory collaborator interfaces.
//!
//! The folding core consumes two seams: [`MemoryRetrieval`] to fetch prior
//! reasoning items for injection into a new branch, and [`MemoryRecord`] to
//! hand finished branch summaries to the extraction pipeline. The vector
//! store, confidence decay and consolidation behind those seams live in a
//! separate engine; this crate defines the contract and ships an in-memory
//! engine good enough for tests and single-process deployments.

mod store;

pub use store::{InMemoryStore, RecordQueue};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Visibility scope of a memory item. Retrieval cascades most specific
/// first: Project, then Team, then Org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    Project,
    Team,
    Org,
}

impl MemoryScope {
    /// Cascade order used by injection.
    pub const CASCADE: [MemoryScope; 3] =
        [MemoryScope::Project, MemoryScope::Team, MemoryScope::Org];
}

/// One retrievable reasoning item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Opaque id assigned by the engine; stable across retrievals.
    pub id: String,
    pub content: String,
    /// Engine confidence in [0, 1]; decays over time in the real engine.
    pub confidence: f64,
    /// Token cost of injecting this item, as estimated by the engine.
    pub estimated_tokens: u64,
    pub scope_tag: MemoryScope,
}

/// A finished branch handed to the extraction pipeline.
#[derive(Debug, Clone)]
pub struct BranchSummary {
    pub branch_id: String,
    pub session_id: String,
    pub description: String,
    /// Scrubbed return message; never raw branch text.
    pub content: String,
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory engine unavailable: {0}")]
    Unavailable(String),

    #[error("memory query failed: {0}")]
    Query(String),
}

/// Read seam: scope-filtered similarity search over prior reasoning items.
#[async_trait]
pub trait MemoryRetrieval: Send + Sync {
    /// Return up to `limit` items relevant to `query` within `scope`,
    /// ordered by descending relevance, filtered by `min_confidence`.
    async fn search(
        &self,
        query: &str,
        scope: MemoryScope,
        min_confidence: f64,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, MemoryError>;
}

/// Write seam: non-blocking handoff of branch summaries for extraction.
pub trait MemoryRecord: Send + Sync {
    /// Enqueue a summary for background extraction. Returns `false` when
    /// the queue is full and the summary was dropped; the caller's own
    /// result is unaffected either way.
    fn enqueue(&self, summary: BranchSummary) -> bool;
}
