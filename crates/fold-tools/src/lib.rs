// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `fold-tools` — the agent-facing tool surface of the folding server.
//!
//! Defines the [`Tool`] trait and [`ToolRegistry`], plus the three branch
//! tools (`branch_create`, `branch_return`, `branch_status`) that wrap the
//! [`fold_core::BranchManager`]. Transport framing lives in `fold-mcp`;
//! this crate only speaks JSON payloads.

mod branch;
mod registry;
mod tool;

pub use branch::{build_registry, BranchCreateTool, BranchReturnTool, BranchStatusTool};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};
