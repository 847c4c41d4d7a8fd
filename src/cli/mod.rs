//! CLI module for playbook-bridge
//!
//! This module provides the command-line interface,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// playbook-bridge - run ansible-playbook and make sense of its output
///
/// Builds the ansible-playbook command line, runs it with JSON reporting,
/// renders a failure summary and extracts values from the report.
#[derive(Parser, Debug, Clone)]
#[command(name = "playbook-bridge")]
#[command(version)]
#[command(about = "Run ansible-playbook and extract results from its JSON report", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "PLAYBOOK_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a playbook and interpret its report
    Run(commands::run::RunArgs),

    /// Print the ansible-playbook arguments without running anything
    Args(commands::args::ArgsArgs),

    /// Render the failure summary of a saved JSON report
    Analyze(commands::analyze::AnalyzeArgs),

    /// Evaluate path queries against a saved JSON report
    Query(commands::query::QueryArgs),

    /// Print the content hash of a playbook and its roles
    Hash(commands::hash::HashArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "playbook-bridge",
            "run",
            "site.yml",
            "--inventory",
            "all: {}",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["playbook-bridge", "-vvvv", "hash", "site.yml"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_json_output() {
        let cli =
            Cli::try_parse_from(["playbook-bridge", "--output", "json", "analyze", "r.json"]).unwrap();
        assert!(cli.is_json());
    }
}
