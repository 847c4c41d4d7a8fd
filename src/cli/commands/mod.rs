//! Subcommands module for the playbook-bridge CLI
//!
//! This module contains all the subcommand implementations and the
//! playbook options they share.

pub mod analyze;
pub mod args;
pub mod hash;
pub mod query;
pub mod run;

use crate::cli::output::OutputFormatter;
use anyhow::{bail, Context, Result};
use clap::Args;
use indexmap::IndexMap;
use playbook_bridge::args::{PlaybookOptions, VaultOptions};
use playbook_bridge::config::Config;
use playbook_bridge::query::ArtifactQuery;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
        }
    }
}

/// ansible-playbook options shared by `run` and `args`
#[derive(Args, Debug, Clone)]
pub struct PlaybookArgs {
    /// Path to the playbook file
    #[arg(required = true)]
    pub playbook: PathBuf,

    /// Host name exposed to the playbook as the `hostname` variable
    #[arg(long)]
    pub name: Option<String>,

    /// ansible-playbook verbosity (0-6)
    #[arg(long = "ansible-verbosity", default_value_t = 0)]
    pub ansible_verbosity: u8,

    /// Run handlers even if a task fails
    #[arg(long)]
    pub force_handlers: bool,

    /// Predict changes without making them
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Show differences in changed files
    #[arg(long = "diff")]
    pub diff_mode: bool,

    /// Only run plays and tasks tagged with these values
    #[arg(long, short = 't', action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// Limit the run to these hosts or patterns
    #[arg(long, short = 'l', action = clap::ArgAction::Append)]
    pub limit: Vec<String>,

    /// Variable file (repeatable)
    #[arg(long = "var-file", action = clap::ArgAction::Append)]
    pub var_files: Vec<String>,

    /// Vault-encrypted variable file (repeatable)
    #[arg(long = "vault-file", action = clap::ArgAction::Append)]
    pub vault_files: Vec<String>,

    /// File holding the vault password
    #[arg(long)]
    pub vault_password_file: Option<String>,

    /// Vault identity label
    #[arg(long)]
    pub vault_id: Option<String>,

    /// Extra string variable, KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "extra-var", action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,

    /// Extra typed variable, KEY=JSON (repeatable)
    #[arg(long = "extra-json", action = clap::ArgAction::Append)]
    pub extra_json: Vec<String>,
}

impl PlaybookArgs {
    /// Convert the command line into typed playbook options
    pub fn to_options(&self) -> Result<PlaybookOptions> {
        let mut options = PlaybookOptions::new(self.playbook.display().to_string())
            .with_verbosity(self.ansible_verbosity)
            .with_vault(VaultOptions {
                files: self.vault_files.clone(),
                password_file: self.vault_password_file.clone(),
                vault_id: self.vault_id.clone(),
            });

        options.name = self.name.clone();
        options.force_handlers = self.force_handlers;
        options.check_mode = self.check_mode;
        options.diff_mode = self.diff_mode;
        options.tags = self.tags.clone();
        options.limit = self.limit.clone();
        options.var_files = self.var_files.clone();

        for pair in &self.extra_vars {
            let (key, value) = split_pair(pair, "--extra-var")?;
            options = options.with_extra_var(key, value);
        }
        for pair in &self.extra_json {
            let (key, value) = split_pair(pair, "--extra-json")?;
            let value: JsonValue = serde_json::from_str(value)
                .with_context(|| format!("--extra-json '{key}' is not valid JSON"))?;
            options = options.with_extra_var(key, value);
        }

        Ok(options)
    }
}

/// Artifact query declarations shared by `run` and `query`
#[derive(Args, Debug, Clone)]
pub struct QueryDeclArgs {
    /// Named query, NAME=PATH (repeatable, evaluated in order)
    #[arg(short = 'q', long = "query", action = clap::ArgAction::Append)]
    pub queries: Vec<String>,

    /// Fail when a query matches nothing
    #[arg(long)]
    pub strict: bool,

    /// Emit query results as JSON
    #[arg(long = "json")]
    pub as_json: bool,
}

impl QueryDeclArgs {
    /// Build the ordered query map
    pub fn to_queries(&self) -> Result<IndexMap<String, ArtifactQuery>> {
        let mut queries = IndexMap::new();
        for decl in &self.queries {
            let (name, path) = split_pair(decl, "--query")?;
            let mut query = ArtifactQuery::new(path);
            query.fail_on_missing_path = self.strict;
            query.as_json = self.as_json;
            if queries.insert(name.to_string(), query).is_some() {
                bail!("query '{name}' is declared twice");
            }
        }
        Ok(queries)
    }
}

/// Split `KEY=VALUE`, rejecting an empty key
fn split_pair<'a>(pair: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("{flag} expects KEY=VALUE, got '{pair}'"),
    }
}

/// Read a saved report file
fn read_report(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read report: {}", path.display()))
}
