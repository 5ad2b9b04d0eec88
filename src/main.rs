// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use fold_core::BranchManager;
use fold_memory::{InMemoryStore, RecordQueue};
use fold_scrub::RegexScrubber;
use fold_tools::build_registry;

/// Capacity of the memory-extraction handoff queue. Overflow drops the
/// extraction request with a warning; branch results are unaffected.
const RECORD_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout is the MCP protocol channel; logs must only ever reach stderr.
    init_logging(cli.verbose);

    match cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
        Commands::ShowConfig => {
            let config = fold_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Serve => serve(cli.config.as_deref()).await,
    }
}

async fn serve(config_path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = fold_config::load(config_path)?;

    let store = Arc::new(InMemoryStore::new());
    let records = Arc::new(RecordQueue::new(RECORD_QUEUE_CAPACITY));
    let scrubber = Arc::new(
        RegexScrubber::new().map_err(|e| anyhow::anyhow!("scrub ruleset: {e}"))?,
    );

    let manager = BranchManager::new(&config, store, scrubber, records);
    let registry = Arc::new(build_registry(manager));

    info!(
        max_depth = config.folding.max_depth,
        default_budget = config.folding.default_budget,
        "foldd serving branch tools on stdio"
    );
    fold_mcp::serve_stdio(registry).await
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("foldd={level},fold_core={level}")));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
