// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "foldd",
    about = "A context-folding server for AI coding agents",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the branch tools over MCP on stdin/stdout.
    ///
    /// The process speaks line-delimited JSON-RPC on standard streams, so
    /// all logging goes to stderr. Point an MCP-capable agent host at
    /// `foldd serve` and it will discover `branch_create`,
    /// `branch_return` and `branch_status`.
    Serve,

    /// Print the effective merged configuration and exit.
    ShowConfig,

    /// Generate shell completions.
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "foldd", &mut std::io::stdout());
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_subcommand_parses() {
        let cli = Cli::parse_from(["foldd", "serve"]);
        assert!(matches!(cli.command, Commands::Serve));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["foldd", "serve", "--config", "/tmp/f.yaml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/f.yaml")));
    }

    #[test]
    fn verbosity_accumulates() {
        let cli = Cli::parse_from(["foldd", "-vv", "serve"]);
        assert_eq!(cli.verbose, 2);
    }
}
