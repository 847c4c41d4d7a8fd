//! Run command - execute a playbook
//!
//! Runs ansible-playbook with JSON reporting, prints the diagnostics the run
//! produced and the result of every declared query.

use super::{CommandContext, PlaybookArgs, QueryDeclArgs};
use anyhow::{bail, Context, Result};
use clap::Parser;
use playbook_bridge::pipeline::{execute, ExecutionRequest};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub playbook: PlaybookArgs,

    #[command(flatten)]
    pub queries: QueryDeclArgs,

    /// Existing inventory file passed through with -i
    #[arg(long, conflicts_with = "inventory")]
    pub inventory_file: Option<PathBuf>,

    /// Inline inventory content, written to a temporary file for the run
    #[arg(long)]
    pub inventory: Option<String>,

    /// Playbook binary
    #[arg(long, env = "PLAYBOOK_BRIDGE_BINARY")]
    pub binary: Option<String>,

    /// Report a failed run as a warning
    #[arg(long = "ignore-failure")]
    pub ignore_playbook_failure: bool,

    /// Print the captured stdout after a successful run
    #[arg(long)]
    pub store_output: bool,

    /// Leave the temporary inventory file on disk
    #[arg(long)]
    pub keep_inventory: bool,

    /// Kill the playbook after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Echo playbook output while it runs
    #[arg(long)]
    pub stream: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let start_time = Instant::now();
        let playbook = &self.playbook.playbook;

        if !playbook.exists() {
            bail!("Playbook file not found: {}", playbook.display());
        }

        ctx.output.banner(&format!(
            "PLAYBOOK: {}",
            playbook.file_name().unwrap_or_default().to_string_lossy()
        ));

        let mut request = ExecutionRequest::new(self.playbook.to_options()?)
            .with_ignore_failure(self.ignore_playbook_failure)
            .with_store_output(self.store_output)
            .with_keep_inventory(self.keep_inventory);

        if let Some(binary) = &self.binary {
            request = request.with_binary(binary);
        }
        if let Some(secs) = self.timeout {
            request = request.with_timeout(Duration::from_secs(secs));
        }
        request = match (&self.inventory_file, &self.inventory) {
            (Some(path), _) => request.with_inventory_path(path.display().to_string()),
            (None, Some(content)) => request.with_inventory_content(content),
            (None, None) => {
                ctx.output
                    .warning("No inventory given, ansible-playbook will use its default");
                request
            }
        };
        request = request.with_config(&ctx.config);

        let mut queries = self.queries.to_queries()?;

        let printer = if self.stream || ctx.config.logging.stream_output {
            let (tx, mut rx) = mpsc::channel(256);
            request = request.with_tap(tx);
            let output = ctx.output.clone();
            Some(tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    output.stream_line(&line);
                }
            }))
        } else {
            None
        };

        let cancel = CancellationToken::new();
        request = request.with_cancellation(cancel.clone());
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        ctx.output.info(&format!("Running {}", request.binary));
        let outcome = execute(&request, &mut queries).await;
        interrupt.abort();
        drop(request);

        if let Some(printer) = printer {
            printer.await.context("output printer task failed")?;
        }

        if ctx.output.is_json() {
            ctx.output.json(&json!({
                "args": outcome.args,
                "exit_code": outcome.exit_code,
                "had_failure": outcome.had_failure,
                "failure_detail": outcome.failure_detail,
                "stdout": outcome.stdout,
                "stderr": outcome.stderr,
                "kept_inventory": outcome.kept_inventory,
                "diagnostics": outcome.diagnostics,
                "queries": queries,
            }));
        } else {
            ctx.output.debug(&format!("Arguments: {}", outcome.args.join(" ")));

            for diagnostic in &outcome.diagnostics {
                ctx.output.diagnostic(diagnostic);
            }

            if !queries.is_empty() && outcome.is_success() {
                ctx.output.section("Artifact queries");
                for (name, query) in &queries {
                    ctx.output.key_value(name, &query.result);
                }
            }

            if !outcome.stdout.is_empty() {
                ctx.output.section("Playbook output");
                ctx.output.raw(&outcome.stdout);
            }

            if let Some(path) = &outcome.kept_inventory {
                ctx.output
                    .info(&format!("Inventory kept at {}", path.display()));
            }

            ctx.output.info(&format!(
                "Finished in {:.2}s",
                start_time.elapsed().as_secs_f64()
            ));
        }
        ctx.output.flush();

        Ok(if outcome.is_success() { 0 } else { 1 })
    }
}
