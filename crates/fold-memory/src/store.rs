// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    BranchSummary, MemoryError, MemoryItem, MemoryRecord, MemoryRetrieval, MemoryScope,
};

/// In-memory [`MemoryRetrieval`] engine.
///
/// Relevance is word-overlap between the query and item content — crude next
/// to a vector store, but deterministic and dependency-free, which is what
/// the folding core needs from its default engine. Items are returned in
/// descending (overlap, confidence) order.
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<Vec<MemoryItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: MemoryItem) {
        self.items.lock().expect("memory store lock").push(item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("memory store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn overlap(query: &str, content: &str) -> usize {
        let content_lower = content.to_lowercase();
        let words: Vec<&str> = content_lower.split_whitespace().collect();
        query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| words.contains(w))
            .count()
    }
}

#[async_trait]
impl MemoryRetrieval for InMemoryStore {
    async fn search(
        &self,
        query: &str,
        scope: MemoryScope,
        min_confidence: f64,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, MemoryError> {
        let items = self.items.lock().expect("memory store lock");
        let mut scored: Vec<(usize, MemoryItem)> = items
            .iter()
            .filter(|i| i.scope_tag == scope && i.confidence >= min_confidence)
            .map(|i| (Self::overlap(query, &i.content), i.clone()))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(b.1.confidence.total_cmp(&a.1.confidence))
        });
        Ok(scored.into_iter().take(limit).map(|(_, i)| i).collect())
    }
}

/// Bounded handoff queue implementing [`MemoryRecord`].
///
/// Overflow drops the summary and counts the drop; the branch whose summary
/// was dropped is unaffected.
pub struct RecordQueue {
    queue: Mutex<VecDeque<BranchSummary>>,
    capacity: usize,
    dropped: AtomicUsize,
}

impl RecordQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Remove and return the oldest pending summary.
    pub fn pop(&self) -> Option<BranchSummary> {
        self.queue.lock().expect("record queue lock").pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("record queue lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MemoryRecord for RecordQueue {
    fn enqueue(&self, summary: BranchSummary) -> bool {
        let mut q = self.queue.lock().expect("record queue lock");
        if q.len() >= self.capacity {
            drop(q);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                branch_id = %summary.branch_id,
                "memory record queue full, dropping extraction request"
            );
            return false;
        }
        q.push_back(summary);
        true
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
