// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `fold-mcp` — MCP (Model Context Protocol) server for foldd.
//!
//! Exposes the branch tools (`branch_create`, `branch_return`,
//! `branch_status`) to any MCP-compatible agent host over **stdio**
//! transport using line-delimited JSON-RPC.
//!
//! # Quick start
//!
//! ```text
//! foldd serve
//! ```
//!
//! # MCP client configuration (`mcp.json`)
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "foldd": {
//!       "command": "foldd",
//!       "args": ["serve"]
//!     }
//!   }
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP client (agent host)
//!       │  stdin/stdout (line-delimited JSON-RPC)
//!       ▼
//! FoldMcpServer (rmcp ServerHandler)
//!       │
//!       ▼
//! ToolRegistry  ──►  branch tools  ──►  BranchManager
//! ```

pub mod bridge;
pub mod server;

pub use server::FoldMcpServer;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use fold_tools::ToolRegistry;

/// Start an MCP stdio server, serving the tools in `registry` on
/// `stdin` / `stdout`.
///
/// This function blocks until the client disconnects (stdin EOF) or the
/// process is terminated. It is designed to be called as the sole operation
/// of the `foldd serve` subcommand.
///
/// # Errors
///
/// Returns an error if the rmcp transport fails to initialize or if the
/// server encounters a fatal I/O error.
pub async fn serve_stdio(registry: Arc<ToolRegistry>) -> Result<()> {
    let server = FoldMcpServer::new(registry);
    let running = server
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}
