//! End-to-end playbook execution.
//!
//! [`execute`] ties the pieces together: it materializes the inventory,
//! builds the argument vector, runs the playbook, and then interprets the
//! captured output. Run outcomes are never returned as `Err`; everything the
//! caller needs to know ends up in [`ExecutionOutcome::diagnostics`].
//!
//! The flow after the process has exited depends on its status:
//!
//! - **Non-zero exit**: the report is parsed anyway. If it decodes, the
//!   rendered failure summary becomes the detail of the error. If it does
//!   not, a decode error carrying the raw stdout is reported as well.
//! - **Zero exit**: artifact queries are evaluated, then the report is
//!   parsed and a failure summary, if any, is reported as a warning.
//!
//! Non-empty stderr is always reported as a warning.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::args::{PlaybookOptions, DEFAULT_BINARY};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Error, Result};
use crate::hash::playbook_hash;
use crate::inventory::TempInventory;
use crate::query::{query_artifacts, ArtifactQuery};
use crate::render::render_failures;
use crate::report::parse_report;
use crate::runner::{OutputLine, ProcessOutput, ProcessRunner};

/// Where the inventory comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventorySource {
    /// Inventory content, written to a temporary file for the run
    Inline(String),
    /// An existing inventory file or inventory reference, passed through as-is
    Path(String),
}

/// Everything needed to run one playbook.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Invocation settings
    pub options: PlaybookOptions,
    /// Inventory for the run
    pub inventory: Option<InventorySource>,
    /// Playbook binary
    pub binary: String,
    /// Report a failed run as a warning instead of an error
    pub ignore_playbook_failure: bool,
    /// Run on every apply, regardless of what changed
    pub replayable: bool,
    /// Leave the temporary inventory file on disk
    pub keep_inventory: bool,
    /// Keep stdout in the outcome after a successful run
    pub store_output: bool,
    /// Kill the playbook after this long
    pub timeout: Option<Duration>,
    /// Environment added on top of the inherited one
    pub env: BTreeMap<String, String>,
    /// Observer for output lines
    pub tap: Option<mpsc::Sender<OutputLine>>,
    /// Cancels the run and kills the process
    pub cancel: Option<CancellationToken>,
}

impl ExecutionRequest {
    /// Create a request for `options` with default settings
    pub fn new(options: PlaybookOptions) -> Self {
        Self {
            options,
            inventory: None,
            binary: DEFAULT_BINARY.to_string(),
            ignore_playbook_failure: false,
            replayable: true,
            keep_inventory: false,
            store_output: false,
            timeout: None,
            env: BTreeMap::new(),
            tap: None,
            cancel: None,
        }
    }

    /// Fill unset settings from configuration.
    pub fn with_config(mut self, config: &Config) -> Self {
        if self.binary == DEFAULT_BINARY {
            self.binary = config.defaults.binary.clone();
        }
        self.store_output |= config.defaults.store_output;
        self.keep_inventory |= config.defaults.keep_inventory;
        if self.timeout.is_none() {
            self.timeout = config.timeout();
        }
        let mut env = config.playbook_env();
        env.extend(std::mem::take(&mut self.env));
        self.env = env;
        self
    }

    /// Use inline inventory content
    pub fn with_inventory_content(mut self, content: impl Into<String>) -> Self {
        self.inventory = Some(InventorySource::Inline(content.into()));
        self
    }

    /// Use an existing inventory file
    pub fn with_inventory_path(mut self, path: impl Into<String>) -> Self {
        self.inventory = Some(InventorySource::Path(path.into()));
        self
    }

    /// Set the playbook binary
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Report a failed run as a warning
    pub fn with_ignore_failure(mut self, ignore: bool) -> Self {
        self.ignore_playbook_failure = ignore;
        self
    }

    /// Set whether the playbook re-runs on every apply
    pub fn with_replayable(mut self, replayable: bool) -> Self {
        self.replayable = replayable;
        self
    }

    /// Keep stdout after a successful run
    pub fn with_store_output(mut self, store: bool) -> Self {
        self.store_output = store;
        self
    }

    /// Leave the temporary inventory on disk
    pub fn with_keep_inventory(mut self, keep: bool) -> Self {
        self.keep_inventory = keep;
        self
    }

    /// Kill the playbook after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Offer output lines to `tap`, skipping lines while it is full
    pub fn with_tap(mut self, tap: mpsc::Sender<OutputLine>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Cancel the run with `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Snapshot of the inputs that decide whether a re-run is needed.
    pub fn record(&self) -> Result<RunRecord> {
        Ok(RunRecord {
            playbook: self.options.playbook.clone(),
            inventory: self.inventory.clone(),
            extra_vars: self.options.extra_vars.clone(),
            playbook_hash: playbook_hash(&self.options.playbook)?,
        })
    }

    /// Whether this request has to run given the record of the previous run.
    ///
    /// A replayable request always runs. Otherwise it runs when there is no
    /// previous run, or when the playbook path, the inventory, the extra
    /// variables or the content hash of the playbook and its roles changed.
    pub fn needs_run(&self, previous: Option<&RunRecord>) -> Result<bool> {
        if self.replayable {
            return Ok(true);
        }
        let Some(previous) = previous else {
            return Ok(true);
        };
        let current = self.record()?;
        let changed = current != *previous;
        debug!(playbook = %current.playbook, changed, "Compared with previous run");
        Ok(changed)
    }

    fn runner(&self) -> ProcessRunner {
        let mut runner = ProcessRunner::new(&self.binary).with_envs(self.env.clone());
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        if let Some(tap) = &self.tap {
            runner = runner.with_tap(tap.clone());
        }
        if let Some(cancel) = &self.cancel {
            runner = runner.with_cancellation(cancel.clone());
        }
        runner
    }
}

/// Inputs of a completed run, kept to decide whether the next one is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Playbook path
    pub playbook: String,
    /// Inventory used
    pub inventory: Option<InventorySource>,
    /// Extra variables
    pub extra_vars: BTreeMap<String, JsonValue>,
    /// Content hash of the playbook and its roles
    pub playbook_hash: String,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Arguments the binary was launched with, empty if it never launched
    pub args: Vec<String>,
    /// Exit code of the playbook
    pub exit_code: Option<i32>,
    /// Captured stdout, subject to the store-output policy
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Rendered failure summary, empty when the report shows no failure
    pub failure_detail: String,
    /// Whether the report counted a failed or unreachable host
    pub had_failure: bool,
    /// Path of the inventory file, when it was kept on disk
    pub kept_inventory: Option<PathBuf>,
    /// Everything reported during the run
    pub diagnostics: Diagnostics,
}

impl ExecutionOutcome {
    /// True when no error diagnostic was reported
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Run a playbook and interpret its output.
///
/// `queries` is evaluated in place: on a successful run with a valid report
/// every query's `result` is overwritten. When any query fails, none is.
pub async fn execute(
    request: &ExecutionRequest,
    queries: &mut IndexMap<String, ArtifactQuery>,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::default();
    let mut options = request.options.clone();

    let inventory = match &request.inventory {
        Some(InventorySource::Inline(content)) => match TempInventory::create(content) {
            Ok(inventory) => {
                options.inventory = Some(inventory.path().display().to_string());
                Some(inventory)
            }
            Err(e) => {
                outcome.diagnostics.push(Diagnostic::from(&e).with_attribute("inventory"));
                return outcome;
            }
        },
        Some(InventorySource::Path(path)) => {
            options.inventory = Some(path.clone());
            None
        }
        None => None,
    };

    match options.build_args() {
        Ok(args) => outcome.args = args,
        Err(e) => {
            outcome.diagnostics.push(Diagnostic::from(&e));
            finish_inventory(inventory, request.keep_inventory, &mut outcome);
            return outcome;
        }
    }

    info!(playbook = %options.playbook, binary = %request.binary, "Running playbook");
    match request.runner().run(&outcome.args).await {
        Ok(output) => interpret(request, output, queries, &mut outcome),
        Err(e) => outcome.diagnostics.push(Diagnostic::from(&e)),
    }

    finish_inventory(inventory, request.keep_inventory, &mut outcome);
    outcome
}

fn interpret(
    request: &ExecutionRequest,
    output: ProcessOutput,
    queries: &mut IndexMap<String, ArtifactQuery>,
    outcome: &mut ExecutionOutcome,
) {
    let stdout = output.stdout_lossy();
    let stderr = output.stderr_lossy();
    outcome.exit_code = output.exit_code;

    if !stderr.is_empty() {
        outcome.diagnostics.warning("Stderr from Ansible", stderr.clone());
    }

    if !output.success {
        let status = match output.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        let summary = format!("Ansible playbook command finished with an error: {status}");

        let mut failures = Vec::new();
        let mut detail = String::new();
        match parse_report(&output.stdout) {
            Ok(report) => {
                let rendered = render_failures(&report);
                outcome.had_failure = rendered.had_failure;
                detail = rendered.text.clone();
                outcome.failure_detail = rendered.text;
            }
            Err(e) => failures.push(Diagnostic::from(&e)),
        }
        failures.push(Diagnostic::error(summary, detail));

        if request.ignore_playbook_failure {
            warn!(exit_code = ?output.exit_code, "Ignoring playbook failure");
            failures = failures.into_iter().map(Diagnostic::into_warning).collect();
        }
        outcome.diagnostics.extend(failures);
        outcome.stderr = stderr;
        return;
    }

    if request.store_output {
        outcome.stdout = stdout.clone();
    }
    outcome.stderr = stderr.clone();

    if let Err(e) = query_artifacts(&output.stdout, queries) {
        let diag = match &e {
            Error::Query { .. } => Diagnostic::error("Playbook artifact queries failed", e.to_string())
                .with_attribute("artifact_queries"),
            _ => Diagnostic::from(&e).with_attribute("artifact_queries"),
        };
        outcome.diagnostics.push(diag);
    }

    match parse_report(&output.stdout) {
        Ok(report) => {
            let rendered = render_failures(&report);
            outcome.had_failure = rendered.had_failure;
            if rendered.had_failure {
                outcome
                    .diagnostics
                    .warning("Ansible results", rendered.text.clone());
            }
            outcome.failure_detail = rendered.text;
        }
        Err(e) => {
            let summary = e.to_string();
            outcome.diagnostics.error(
                summary,
                format!("STDERR:\n{stderr}\n\nSTDOUT:\n{stdout}"),
            );
        }
    }
}

fn finish_inventory(inventory: Option<TempInventory>, keep: bool, outcome: &mut ExecutionOutcome) {
    let Some(inventory) = inventory else {
        return;
    };
    let path = inventory.path().display().to_string();
    let result = if keep {
        inventory.keep().map(|kept| outcome.kept_inventory = Some(kept))
    } else {
        inventory.remove()
    };
    if let Err(e) = result {
        outcome
            .diagnostics
            .warning(format!("Failed to remove file {path}"), e.to_string());
    }
}
