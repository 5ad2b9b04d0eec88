// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Workspace smoke tests: the folding server assembled exactly the way the
/// `serve` subcommand assembles it, driven through the tool registry.
use std::sync::Arc;

use fold_config::FoldConfig;
use fold_core::BranchManager;
use fold_memory::{InMemoryStore, MemoryItem, MemoryScope, RecordQueue};
use fold_scrub::RegexScrubber;
use fold_tools::{build_registry, ToolCall, ToolRegistry};
use serde_json::json;

fn server_registry() -> (ToolRegistry, Arc<RecordQueue>) {
    let mut cfg = FoldConfig::default();
    cfg.limits.branch_rate_limit_per_minute = 0;
    let store = Arc::new(InMemoryStore::new());
    store.insert(MemoryItem {
        id: "m-login".into(),
        content: "login flow uses session cookies".into(),
        confidence: 0.9,
        estimated_tokens: 40,
        scope_tag: MemoryScope::Project,
    });
    let records = Arc::new(RecordQueue::new(8));
    let manager = BranchManager::new(
        &cfg,
        store,
        Arc::new(RegexScrubber::new().expect("ruleset must compile")),
        records.clone(),
    );
    (build_registry(manager), records)
}

fn call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: "it-1".into(),
        name: name.into(),
        args,
    }
}

#[tokio::test]
async fn full_branch_lifecycle_through_the_tool_surface() {
    let (registry, records) = server_registry();

    // Create a branch with memory injection on.
    let out = registry
        .execute(&call(
            "branch_create",
            json!({
                "description": "login flow",
                "prompt": "map the session handling",
                "session_id": "it-session",
                "budget": 2000,
                "timeout_seconds": 0
            }),
        ))
        .await;
    assert!(!out.is_error, "create failed: {}", out.content);
    let created: serde_json::Value = serde_json::from_str(&out.content).unwrap();
    let branch_id = created["branch_id"].as_str().unwrap().to_string();
    assert_eq!(created["depth"], 0);
    assert_eq!(
        created["injected_preview"],
        json!(["m-login"]),
        "matching memory must be injected"
    );

    // Return with a secret in the message and extraction requested.
    let out = registry
        .execute(&call(
            "branch_return",
            json!({
                "branch_id": branch_id,
                "message": "cookie auth confirmed; api_key = sk-abcdefghij0123456789ABCD",
                "extract_memory": true
            }),
        ))
        .await;
    assert!(!out.is_error, "return failed: {}", out.content);
    let returned: serde_json::Value = serde_json::from_str(&out.content).unwrap();
    assert_eq!(returned["status"], "completed");

    // The terminal snapshot carries the scrubbed result and provenance.
    let out = registry
        .execute(&call("branch_status", json!({ "branch_id": branch_id })))
        .await;
    let snapshot: serde_json::Value = serde_json::from_str(&out.content).unwrap();
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["injected_memory_ids"], json!(["m-login"]));
    let result = snapshot["result"].as_str().unwrap();
    assert!(result.contains("cookie auth confirmed"));
    assert!(!result.contains("sk-abcdefghij0123456789ABCD"));

    // The scrubbed summary reached the extraction queue.
    let summary = records.pop().expect("extraction summary must be enqueued");
    assert!(!summary.content.contains("sk-abcdefghij0123456789ABCD"));
}

#[tokio::test]
async fn configuration_defaults_flow_into_created_branches() {
    let (registry, _records) = server_registry();

    let out = registry
        .execute(&call(
            "branch_create",
            json!({
                "description": "defaults",
                "prompt": "p",
                "session_id": "it-defaults",
                "inject_memories": false
            }),
        ))
        .await;
    assert!(!out.is_error);
    let created: serde_json::Value = serde_json::from_str(&out.content).unwrap();
    // Omitted budget falls back to the documented default.
    assert_eq!(created["budget_allocated"], 8192);
}
