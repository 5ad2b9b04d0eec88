// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The branch manager — lifecycle orchestration for context folding.
//!
//! Owns the state machine: validates `branch_create` requests, allocates
//! budgets and deadlines, keeps the per-session current-branch pointer
//! singular, cascades force-returns through active descendants (deepest
//! first), and scrubs every string that leaves a branch as its `result`.
//!
//! The manager reacts to budget and timeout events from the bus rather
//! than being called by the trackers, so no component here holds a
//! reference cycle. All transitions for one branch funnel through the
//! repository's per-record lock; whichever terminal transition wins a race
//! leaves the loser observing `AlreadyCompleted` with the winner's status.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fold_config::FoldConfig;
use fold_memory::{BranchSummary, MemoryRecord, MemoryRetrieval};
use fold_scrub::{ScrubOutcome, Scrubber};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::branch::{Branch, BranchStatus, MAX_DESCRIPTION_LEN, MAX_PROMPT_LEN};
use crate::budget::BudgetTracker;
use crate::error::FoldError;
use crate::events::{EventBus, FoldEvent};
use crate::inject::{InjectorConfig, MemoryInjector};
use crate::repository::BranchRepository;
use crate::session::SessionState;
use crate::timeout::TimeoutManager;

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` falls back to `false`, so opt-out flags
/// need a named function.
fn default_true() -> bool {
    true
}

/// Lifecycle knobs, denormalized from [`FoldConfig`] into the units the
/// manager works with.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub max_depth: u32,
    pub max_budget: u64,
    pub default_budget: u64,
    pub max_timeout: Duration,
    pub default_timeout: Duration,
    pub max_active_per_session: usize,
    pub max_active_per_process: usize,
    pub rate_limit_per_minute: u32,
    pub scrub_timeout: Duration,
    pub injection_soft_deadline: Duration,
    pub terminal_ttl: Duration,
}

impl From<&FoldConfig> for ManagerConfig {
    fn from(cfg: &FoldConfig) -> Self {
        Self {
            max_depth: cfg.folding.max_depth,
            max_budget: cfg.folding.max_budget,
            default_budget: cfg.folding.default_budget,
            max_timeout: Duration::from_secs(cfg.folding.max_timeout_seconds),
            default_timeout: Duration::from_secs(cfg.folding.default_timeout_seconds),
            max_active_per_session: cfg.limits.max_active_branches_per_session,
            max_active_per_process: cfg.limits.max_active_branches_per_process,
            rate_limit_per_minute: cfg.limits.branch_rate_limit_per_minute,
            scrub_timeout: Duration::from_millis(cfg.scrub.scrub_timeout_ms),
            injection_soft_deadline: Duration::from_millis(cfg.memory.injection_soft_deadline_ms),
            terminal_ttl: Duration::from_secs(cfg.folding.terminal_ttl_seconds),
        }
    }
}

/// `branch_create` request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub session_id: String,
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_true")]
    pub inject_memories: bool,
}

/// `branch_create` success payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub branch_id: String,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub budget_allocated: u64,
    /// Injected item ids known at response time; empty when injection is
    /// still running in the background.
    pub injected_preview: Vec<String>,
}

/// `branch_return` success payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub branch_id: String,
    pub status: BranchStatus,
    pub scrubbed_length: usize,
    pub children_force_returned: usize,
}

/// `branch_status` snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BranchSnapshot {
    pub branch_id: String,
    pub session_id: String,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub status: BranchStatus,
    pub budget_total: u64,
    pub budget_used: u64,
    pub timeout_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub injected_memory_ids: Vec<String>,
    pub injection_warning: bool,
    pub injection_pending: bool,
    pub is_current: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

pub struct BranchManager {
    config: ManagerConfig,
    repo: Arc<BranchRepository>,
    budget: Arc<BudgetTracker>,
    bus: Arc<EventBus>,
    timeouts: Arc<TimeoutManager>,
    injector: Arc<MemoryInjector>,
    scrubber: Arc<dyn Scrubber>,
    records: Arc<dyn MemoryRecord>,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
    process_active: AtomicUsize,
}

impl BranchManager {
    /// Build the manager with its component graph and start the event loop
    /// and terminal-TTL sweeper. Must be called within a tokio runtime.
    pub fn new(
        cfg: &FoldConfig,
        retrieval: Arc<dyn MemoryRetrieval>,
        scrubber: Arc<dyn Scrubber>,
        records: Arc<dyn MemoryRecord>,
    ) -> Arc<Self> {
        let bus = Arc::new(EventBus::new());
        let repo = Arc::new(BranchRepository::new());
        let budget = Arc::new(BudgetTracker::new(bus.clone()));
        let timeouts = Arc::new(TimeoutManager::new(bus.clone()));
        let injector = Arc::new(MemoryInjector::new(retrieval, InjectorConfig::from(cfg)));

        let manager = Arc::new(Self {
            config: ManagerConfig::from(cfg),
            repo,
            budget,
            bus,
            timeouts,
            injector,
            scrubber,
            records,
            sessions: Mutex::new(HashMap::new()),
            process_active: AtomicUsize::new(0),
        });
        manager.spawn_event_loop();
        manager.spawn_sweeper();
        manager
    }

    /// The repository holding all branch records. Read-only access for the
    /// tool surface and tests; mutations go through the manager.
    pub fn repository(&self) -> &Arc<BranchRepository> {
        &self.repo
    }

    /// The budget tracker. The surrounding tool dispatcher calls
    /// [`BudgetTracker::consume`] with measured increments.
    pub fn budget(&self) -> &Arc<BudgetTracker> {
        &self.budget
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Non-terminal branches across all sessions.
    pub fn active_branch_count(&self) -> usize {
        self.process_active.load(Ordering::Acquire)
    }

    // ── branch_create ────────────────────────────────────────────────────────

    pub async fn create(&self, req: CreateRequest) -> Result<CreateResponse, FoldError> {
        let budget_total = req.budget.unwrap_or(self.config.default_budget);
        let timeout_secs = req
            .timeout_seconds
            .unwrap_or(self.config.default_timeout.as_secs());
        self.validate(&req, budget_total, timeout_secs)?;

        let session = self.session_entry(&req.session_id);

        // Parentage and the current-branch flip are decided under the
        // session lock; nothing in this block awaits.
        let (branch_id, parent_id, depth) = {
            let mut state = session.lock().expect("session lock poisoned");
            if state.ended {
                return Err(FoldError::NotFound(req.session_id.clone()));
            }
            let (parent_id, depth) = match &state.current {
                Some(pid) => (Some(pid.clone()), self.repo.get(pid)?.depth + 1),
                None => (None, 0),
            };
            if depth >= self.config.max_depth {
                return Err(FoldError::MaxDepthExceeded(self.config.max_depth));
            }
            if state.active >= self.config.max_active_per_session {
                return Err(FoldError::TooManyConcurrentBranches(format!(
                    "session {} has {} non-terminal branches",
                    req.session_id, state.active
                )));
            }
            if self.process_active.load(Ordering::Acquire) >= self.config.max_active_per_process
            {
                return Err(FoldError::TooManyConcurrentBranches(format!(
                    "process limit of {} branches reached",
                    self.config.max_active_per_process
                )));
            }
            if !state.bucket.try_acquire() {
                return Err(FoldError::RateLimited(req.session_id.clone()));
            }

            let branch_id = Uuid::new_v4().to_string();
            self.budget
                .allocate(&branch_id, budget_total)
                .map_err(|e| FoldError::Internal(e.to_string()))?;

            let now = Utc::now();
            let mut branch = Branch {
                id: branch_id.clone(),
                session_id: req.session_id.clone(),
                parent_id: parent_id.clone(),
                depth,
                description: req.description.clone(),
                prompt: req.prompt.clone(),
                budget_total,
                budget_used: 0,
                timeout_deadline: (timeout_secs > 0)
                    .then(|| now + ChronoDuration::seconds(timeout_secs as i64)),
                status: BranchStatus::Created,
                result: None,
                error: None,
                injected_memory_ids: Vec::new(),
                injection_warning: false,
                injection_pending: req.inject_memories,
                is_current: true,
                created_at: now,
                completed_at: None,
            };
            // Created → Active happens inside create; externally only
            // Active is observable.
            branch
                .transition(BranchStatus::Active)
                .map_err(|e| FoldError::Internal(e.to_string()))?;
            if let Err(e) = self.repo.create(branch) {
                self.budget.deallocate(&branch_id);
                return Err(FoldError::Internal(e.to_string()));
            }

            if let Some(pid) = &parent_id {
                // Suspend the parent: still Active, no longer current.
                if let Err(e) = self.repo.update(pid, |p| {
                    p.is_current = false;
                    Ok(())
                }) {
                    warn!(parent_id = %pid, error = %e, "could not suspend parent branch");
                }
            }
            state.current = Some(branch_id.clone());
            state.active += 1;
            self.process_active.fetch_add(1, Ordering::AcqRel);
            (branch_id, parent_id, depth)
        };

        if timeout_secs > 0 {
            self.timeouts
                .arm(&branch_id, Duration::from_secs(timeout_secs));
        }

        let injected_preview = if req.inject_memories {
            self.start_injection(&branch_id, &req.description, budget_total)
                .await
        } else {
            Vec::new()
        };

        info!(
            branch_id = %branch_id,
            session_id = %req.session_id,
            depth,
            budget = budget_total,
            "branch created"
        );
        Ok(CreateResponse {
            branch_id,
            parent_id,
            depth,
            budget_allocated: budget_total,
            injected_preview,
        })
    }

    fn validate(
        &self,
        req: &CreateRequest,
        budget_total: u64,
        timeout_secs: u64,
    ) -> Result<(), FoldError> {
        if req.session_id.trim().is_empty() {
            return Err(FoldError::InvalidInput("session_id must not be empty".into()));
        }
        if req.description.trim().is_empty() {
            return Err(FoldError::InvalidInput(
                "description must not be empty".into(),
            ));
        }
        if req.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(FoldError::InvalidInput(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if req.prompt.chars().count() > MAX_PROMPT_LEN {
            return Err(FoldError::InvalidInput(format!(
                "prompt exceeds {MAX_PROMPT_LEN} characters"
            )));
        }
        if budget_total == 0 || budget_total > self.config.max_budget {
            return Err(FoldError::InvalidInput(format!(
                "budget must be within [1, {}]",
                self.config.max_budget
            )));
        }
        if timeout_secs > self.config.max_timeout.as_secs() {
            return Err(FoldError::InvalidInput(format!(
                "timeout_seconds must be within [0, {}]",
                self.config.max_timeout.as_secs()
            )));
        }
        Ok(())
    }

    /// Kick off the injection task and give it the soft deadline to finish
    /// inline; past that it continues in the background and the preview
    /// stays empty.
    async fn start_injection(
        &self,
        branch_id: &str,
        query: &str,
        budget_total: u64,
    ) -> Vec<String> {
        let injector = self.injector.clone();
        let repo = self.repo.clone();
        let id = branch_id.to_string();
        let query = query.to_string();
        let mut task = tokio::spawn(async move {
            injector.run(repo, id, query, budget_total).await;
        });
        match tokio::time::timeout(self.config.injection_soft_deadline, &mut task).await {
            Ok(_) => self
                .repo
                .get(branch_id)
                .map(|b| b.injected_memory_ids)
                .unwrap_or_default(),
            Err(_) => {
                debug!(branch_id = %branch_id, "memory injection continues in the background");
                Vec::new()
            }
        }
    }

    // ── branch_return ────────────────────────────────────────────────────────

    /// Fold a branch back into its parent context.
    ///
    /// Active descendants are force-returned first, deepest first; the
    /// message is scrubbed; the terminal transition is atomic. Scrub
    /// failure aborts the return and leaves the branch Active so the
    /// caller can retry.
    pub async fn branch_return(
        &self,
        branch_id: &str,
        message: &str,
        extract_memory: bool,
    ) -> Result<ReturnOutcome, FoldError> {
        let snapshot = self.repo.get(branch_id)?;
        if snapshot.status.is_terminal() {
            return Err(FoldError::AlreadyCompleted {
                status: snapshot.status,
            });
        }

        let child_reason = format!("parent {} returning", snapshot.id);
        let mut forced = 0;
        for id in self.active_descendants(&snapshot) {
            if self
                .force_terminate(&id, &child_reason, BranchStatus::ForceReturned)
                .await
            {
                forced += 1;
            }
        }

        let (updated, scrubbed_length) = self
            .terminate_one(
                branch_id,
                message.to_string(),
                None,
                BranchStatus::Completed,
                extract_memory,
            )
            .await?;

        Ok(ReturnOutcome {
            branch_id: updated.id,
            status: updated.status,
            scrubbed_length,
            children_force_returned: forced,
        })
    }

    /// Terminal transition driven by budget, timeout, or session end.
    ///
    /// Cascades through active descendants like a normal return, but the
    /// result is a synthetic summary and no memory extraction happens.
    pub async fn force_return(
        &self,
        branch_id: &str,
        reason: &str,
        terminal: BranchStatus,
    ) -> Result<(), FoldError> {
        let snapshot = self.repo.get(branch_id)?;
        if snapshot.status.is_terminal() {
            return Err(FoldError::AlreadyCompleted {
                status: snapshot.status,
            });
        }

        let child_reason = format!("parent {} returning", snapshot.id);
        for id in self.active_descendants(&snapshot) {
            self.force_terminate(&id, &child_reason, BranchStatus::ForceReturned)
                .await;
        }

        if !self.force_terminate(branch_id, reason, terminal).await {
            let status = self.repo.get(branch_id)?.status;
            return Err(FoldError::AlreadyCompleted { status });
        }
        Ok(())
    }

    /// `branch_status` snapshot; merges the live budget counter for
    /// non-terminal branches.
    pub fn status(&self, branch_id: &str) -> Result<BranchSnapshot, FoldError> {
        let b = self.repo.get(branch_id)?;
        let budget_used = if b.status.is_terminal() {
            b.budget_used
        } else {
            self.budget.used(&b.id).unwrap_or(b.budget_used)
        };
        Ok(BranchSnapshot {
            branch_id: b.id,
            session_id: b.session_id,
            parent_id: b.parent_id,
            depth: b.depth,
            status: b.status,
            budget_total: b.budget_total,
            budget_used,
            timeout_deadline: b.timeout_deadline,
            created_at: b.created_at,
            completed_at: b.completed_at,
            injected_memory_ids: b.injected_memory_ids,
            injection_warning: b.injection_warning,
            injection_pending: b.injection_pending,
            is_current: b.is_current,
            result: b.result,
            error: b.error,
        })
    }

    /// External session-end signal: force-return every non-terminal branch
    /// (reverse creation order, so children precede parents), then destroy
    /// the session's records. Subsequent `branch_*` calls for these ids
    /// fail with NotFound.
    pub async fn end_session(&self, session_id: &str) {
        let Some(session) = self.session_handle(session_id) else {
            return;
        };
        {
            let mut state = session.lock().expect("session lock poisoned");
            if state.ended {
                return;
            }
            state.ended = true;
        }

        let branches = self.repo.list_by_session(session_id);
        for b in branches.iter().rev() {
            if !b.status.is_terminal() {
                self.force_terminate(&b.id, "session ended", BranchStatus::ForceReturned)
                    .await;
            }
        }
        for b in self.repo.list_by_session(session_id) {
            let _ = self.repo.delete(&b.id);
            self.budget.deallocate(&b.id);
            self.timeouts.cancel(&b.id);
        }
        info!(session_id = %session_id, "session ended, branches destroyed");
    }

    // ── Termination internals ────────────────────────────────────────────────

    /// Non-terminal strict descendants of `root`, deepest first (reverse
    /// creation order). Creation order guarantees parents precede children,
    /// so one forward pass finds the subtree.
    fn active_descendants(&self, root: &Branch) -> Vec<String> {
        let branches = self.repo.list_by_session(&root.session_id);
        let mut subtree: HashSet<&str> = HashSet::new();
        subtree.insert(root.id.as_str());
        let mut result = Vec::new();
        for b in &branches {
            if let Some(pid) = &b.parent_id {
                if subtree.contains(pid.as_str()) {
                    subtree.insert(b.id.as_str());
                    if !b.status.is_terminal() {
                        result.push(b.id.clone());
                    }
                }
            }
        }
        result.reverse();
        result
    }

    /// Force one branch into `terminal` with a synthetic summary. Returns
    /// true when this call performed a terminal transition (including the
    /// Failed fallback), false when the branch already was terminal or gone.
    async fn force_terminate(
        &self,
        branch_id: &str,
        reason: &str,
        terminal: BranchStatus,
    ) -> bool {
        let synthetic = format!("branch terminated: {reason}");
        let error_field =
            (terminal == BranchStatus::ForceReturned).then(|| reason.to_string());
        match self
            .terminate_one(branch_id, synthetic, error_field, terminal, false)
            .await
        {
            Ok(_) => true,
            Err(FoldError::AlreadyCompleted { .. }) | Err(FoldError::NotFound(_)) => false,
            Err(FoldError::ScrubFailed(msg)) => {
                // The branch cannot stay Active on an automatic path with
                // nobody left to retry; Failed carries the error instead
                // of a result.
                self.mark_failed(branch_id, &msg);
                true
            }
            Err(e) => {
                error!(branch_id = %branch_id, error = %e, "force-return failed");
                self.mark_failed(branch_id, &e.to_string());
                true
            }
        }
    }

    /// The single egress point: scrub, transition, record the result,
    /// release the session slot, publish `BranchTerminated`.
    async fn terminate_one(
        &self,
        branch_id: &str,
        raw_message: String,
        error_field: Option<String>,
        terminal: BranchStatus,
        extract_memory: bool,
    ) -> Result<(Branch, usize), FoldError> {
        let scrubbed = self.scrub_with_deadline(&raw_message).await?;
        let final_used = self.budget.used(branch_id);

        let mut was_current = false;
        let scrubbed_text = scrubbed.text.clone();
        let updated = self.repo.update(branch_id, |b| {
            b.transition(terminal)?;
            was_current = b.is_current;
            b.is_current = false;
            b.result = Some(scrubbed_text.clone());
            if let Some(e) = &error_field {
                b.error = Some(e.clone());
            }
            if let Some(used) = final_used {
                b.budget_used = used;
            }
            Ok(())
        })?;

        self.finish_termination(&updated, was_current);

        if extract_memory && terminal == BranchStatus::Completed {
            let accepted = self.records.enqueue(BranchSummary {
                branch_id: updated.id.clone(),
                session_id: updated.session_id.clone(),
                description: updated.description.clone(),
                content: scrubbed.text.clone(),
            });
            if !accepted {
                warn!(branch_id = %updated.id, "memory extraction request dropped");
            }
        }

        Ok((updated, scrubbed.text.len()))
    }

    /// Terminal bookkeeping shared by every path that completed a
    /// transition: session slot release, current-pointer handoff to the
    /// parent, and the `BranchTerminated` event.
    fn finish_termination(&self, b: &Branch, was_current: bool) {
        if let Some(session) = self.session_handle(&b.session_id) {
            let mut state = session.lock().expect("session lock poisoned");
            state.active = state.active.saturating_sub(1);
            if state.current.as_deref() == Some(b.id.as_str()) {
                state.current = b.parent_id.clone();
            }
        }
        self.process_active.fetch_sub(1, Ordering::AcqRel);

        if was_current {
            if let Some(pid) = &b.parent_id {
                let _ = self.repo.update(pid, |p| {
                    if !p.status.is_terminal() {
                        p.is_current = true;
                    }
                    Ok(())
                });
            }
        }

        debug!(branch_id = %b.id, status = %b.status, "branch terminated");
        self.bus.publish(FoldEvent::BranchTerminated {
            branch_id: b.id.clone(),
            status: b.status,
        });
    }

    /// Last-resort terminal transition when even the synthetic summary
    /// cannot be scrubbed. Failed branches carry `error`, never `result`.
    fn mark_failed(&self, branch_id: &str, msg: &str) {
        let final_used = self.budget.used(branch_id);
        let mut was_current = false;
        let res = self.repo.update(branch_id, |b| {
            b.transition(BranchStatus::Failed)?;
            was_current = b.is_current;
            b.is_current = false;
            b.error = Some(msg.to_string());
            if let Some(used) = final_used {
                b.budget_used = used;
            }
            Ok(())
        });
        match res {
            Ok(updated) => self.finish_termination(&updated, was_current),
            Err(FoldError::AlreadyCompleted { .. }) | Err(FoldError::NotFound(_)) => {}
            Err(e) => {
                error!(branch_id = %branch_id, error = %e, "could not mark branch failed")
            }
        }
    }

    async fn scrub_with_deadline(&self, text: &str) -> Result<ScrubOutcome, FoldError> {
        match tokio::time::timeout(self.config.scrub_timeout, self.scrubber.scrub(text)).await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(FoldError::ScrubFailed(e.to_string())),
            Err(_) => Err(FoldError::ScrubFailed("scrub deadline exceeded".into())),
        }
    }

    // ── Session plumbing ─────────────────────────────────────────────────────

    fn session_entry(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        self.sessions
            .lock()
            .expect("session index lock poisoned")
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionState::new(
                    self.config.rate_limit_per_minute,
                )))
            })
            .clone()
    }

    fn session_handle(&self, session_id: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions
            .lock()
            .expect("session index lock poisoned")
            .get(session_id)
            .cloned()
    }

    // ── Background tasks ─────────────────────────────────────────────────────

    fn spawn_event_loop(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.handle_event(event).await;
            }
        });
    }

    async fn handle_event(&self, event: FoldEvent) {
        match event {
            FoldEvent::BudgetWarning {
                branch_id,
                used,
                total,
            } => {
                warn!(branch_id = %branch_id, used, total, "branch nearing budget exhaustion");
            }
            FoldEvent::BudgetExhausted {
                branch_id,
                used,
                total,
            } => {
                warn!(branch_id = %branch_id, used, total, "budget exhausted, force-returning");
                self.react_force_return(&branch_id, "budget exhausted", BranchStatus::BudgetExhausted)
                    .await;
            }
            FoldEvent::TimeoutExpired { branch_id } => {
                warn!(branch_id = %branch_id, "timeout expired, force-returning");
                self.react_force_return(&branch_id, "timeout exceeded", BranchStatus::TimedOut)
                    .await;
            }
            FoldEvent::BranchTerminated { branch_id, status } => {
                self.budget.deallocate(&branch_id);
                self.timeouts.cancel(&branch_id);
                debug!(branch_id = %branch_id, status = %status, "branch resources released");
            }
        }
    }

    /// Event-driven force-return; losing the race to another terminal
    /// transition is expected and not an error.
    async fn react_force_return(&self, branch_id: &str, reason: &str, terminal: BranchStatus) {
        match self.force_return(branch_id, reason, terminal).await {
            Ok(())
            | Err(FoldError::AlreadyCompleted { .. })
            | Err(FoldError::NotFound(_)) => {}
            Err(e) => {
                error!(branch_id = %branch_id, error = %e, "event-driven force-return failed")
            }
        }
    }

    fn spawn_sweeper(self: &Arc<Self>) {
        let ttl = self.config.terminal_ttl;
        if ttl.is_zero() {
            return;
        }
        let manager = Arc::clone(self);
        let period = Duration::from_secs(ttl.as_secs().clamp(1, 60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep_expired();
            }
        });
    }

    /// Delete terminal branches older than the TTL so `branch_status` on
    /// them reports NotFound from then on.
    fn sweep_expired(&self) {
        let Ok(ttl) = ChronoDuration::from_std(self.config.terminal_ttl) else {
            return;
        };
        let cutoff = Utc::now() - ttl;
        for b in self.repo.all() {
            let expired = b.status.is_terminal() && b.completed_at.is_some_and(|t| t <= cutoff);
            if !expired {
                continue;
            }
            if self.repo.delete(&b.id).is_ok() {
                debug!(branch_id = %b.id, "terminal branch swept after ttl");
            }
        }
    }
}
