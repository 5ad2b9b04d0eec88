// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `fold-scrub` — secret detection and redaction for branch egress.
//!
//! Every string that leaves a branch as its `result` passes through a
//! [`Scrubber`] first. The scrubber replaces detected secrets with stable
//! `[REDACTED:<rule>]` markers and leaves every non-secret byte of the
//! input untouched, so paths, identifiers and prose survive verbatim.
//!
//! The crate ships one implementation, [`RegexScrubber`], driven by a
//! compiled ruleset covering the common credential shapes (cloud access
//! keys, personal access tokens, JWTs, PEM private-key blocks, assignment
//! style `api_key = ...` literals). Deployments that need an external
//! scrubbing engine implement [`Scrubber`] themselves.

mod rules;

pub use rules::RegexScrubber;

use async_trait::async_trait;
use thiserror::Error;

/// The result of scrubbing one text.
#[derive(Debug, Clone)]
pub struct ScrubOutcome {
    /// Input text with every detected secret replaced by a redaction marker.
    pub text: String,
    /// Number of secrets redacted. Opaque; reported only in logs/metrics.
    pub findings: usize,
}

#[derive(Debug, Error)]
pub enum ScrubError {
    #[error("scrub engine failure: {0}")]
    Engine(String),

    #[error("scrub deadline exceeded")]
    DeadlineExceeded,
}

/// Secret scrubbing contract.
///
/// The operation is total: all inputs yield an output, except for
/// engine/I-O failures which surface as [`ScrubError`]. Output guarantees:
///
/// - every detected secret is replaced by a stable redaction marker;
/// - non-secret spans are byte-identical to the input;
/// - the same input always yields the same output.
#[async_trait]
pub trait Scrubber: Send + Sync {
    async fn scrub(&self, text: &str) -> Result<ScrubOutcome, ScrubError>;
}
