// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Thread-safe in-memory store of branch records.
//!
//! The repository is the sole mutator of branch records. Writers go through
//! [`BranchRepository::update`], which runs the mutation under the record's
//! own lock; readers always receive deep clones, never aliases. A
//! collection-level read–write lock guards the id and session indexes, so
//! updates to different branches proceed in parallel while updates to the
//! same branch serialize.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::branch::Branch;
use crate::error::FoldError;

#[derive(Default)]
pub struct BranchRepository {
    records: RwLock<HashMap<String, Arc<Mutex<Branch>>>>,
    /// Branch ids per session, in creation order.
    by_session: RwLock<HashMap<String, Vec<String>>>,
}

impl BranchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails with `Duplicate` if the id exists.
    pub fn create(&self, branch: Branch) -> Result<(), FoldError> {
        let mut records = self.records.write().expect("repository lock poisoned");
        if records.contains_key(&branch.id) {
            return Err(FoldError::Duplicate(branch.id));
        }
        let mut index = self.by_session.write().expect("repository lock poisoned");
        index
            .entry(branch.session_id.clone())
            .or_default()
            .push(branch.id.clone());
        records.insert(branch.id.clone(), Arc::new(Mutex::new(branch)));
        Ok(())
    }

    /// Return a deep snapshot of one record.
    pub fn get(&self, id: &str) -> Result<Branch, FoldError> {
        let records = self.records.read().expect("repository lock poisoned");
        let cell = records
            .get(id)
            .ok_or_else(|| FoldError::NotFound(id.to_string()))?;
        let snapshot = cell.lock().expect("branch lock poisoned").clone();
        Ok(snapshot)
    }

    /// Apply `mutate` to one record under its lock and return the updated
    /// snapshot. If the mutator fails the record is left unchanged.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Branch, FoldError>
    where
        F: FnOnce(&mut Branch) -> Result<(), FoldError>,
    {
        let cell = {
            let records = self.records.read().expect("repository lock poisoned");
            records
                .get(id)
                .ok_or_else(|| FoldError::NotFound(id.to_string()))?
                .clone()
        };
        let mut guard = cell.lock().expect("branch lock poisoned");
        let mut staged = guard.clone();
        mutate(&mut staged)?;
        *guard = staged.clone();
        Ok(staged)
    }

    /// All branches of a session, in creation order.
    pub fn list_by_session(&self, session_id: &str) -> Vec<Branch> {
        let ids: Vec<String> = {
            let index = self.by_session.read().expect("repository lock poisoned");
            index.get(session_id).cloned().unwrap_or_default()
        };
        let records = self.records.read().expect("repository lock poisoned");
        ids.iter()
            .filter_map(|id| records.get(id))
            .map(|cell| cell.lock().expect("branch lock poisoned").clone())
            .collect()
    }

    /// Direct children of a branch, in creation order.
    pub fn children(&self, id: &str) -> Vec<Branch> {
        let session_id = match self.get(id) {
            Ok(b) => b.session_id,
            Err(_) => return Vec::new(),
        };
        self.list_by_session(&session_id)
            .into_iter()
            .filter(|b| b.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// The one Active branch marked current for the session, if any.
    pub fn current(&self, session_id: &str) -> Option<Branch> {
        self.list_by_session(session_id)
            .into_iter()
            .find(|b| b.is_current && !b.status.is_terminal())
    }

    /// Every record in the store, unordered across sessions.
    pub fn all(&self) -> Vec<Branch> {
        let records = self.records.read().expect("repository lock poisoned");
        records
            .values()
            .map(|cell| cell.lock().expect("branch lock poisoned").clone())
            .collect()
    }

    /// Remove one record and its index entry.
    pub fn delete(&self, id: &str) -> Result<(), FoldError> {
        let mut records = self.records.write().expect("repository lock poisoned");
        let cell = records
            .remove(id)
            .ok_or_else(|| FoldError::NotFound(id.to_string()))?;
        let session_id = cell.lock().expect("branch lock poisoned").session_id.clone();
        let mut index = self.by_session.write().expect("repository lock poisoned");
        if let Some(ids) = index.get_mut(&session_id) {
            ids.retain(|x| x != id);
            if ids.is_empty() {
                index.remove(&session_id);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("repository lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
