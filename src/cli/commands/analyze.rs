//! Analyze command - render the failure summary of a saved report
//!
//! Reads a report produced with `ANSIBLE_STDOUT_CALLBACK=json` and prints
//! every failed or unreachable host, grouped by play and task.

use super::{read_report, CommandContext};
use anyhow::Result;
use clap::Parser;
use playbook_bridge::render::render_failures;
use playbook_bridge::report::parse_report;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the analyze command
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Path to the JSON report
    pub report: PathBuf,
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let raw = read_report(&self.report)?;
        let report = parse_report(&raw)?;
        let summary = render_failures(&report);

        if ctx.output.is_json() {
            ctx.output.json(&json!({
                "had_failure": summary.had_failure,
                "failing_hosts": report.failing_hosts().collect::<Vec<_>>(),
                "detail": summary.text,
            }));
        } else if summary.had_failure {
            ctx.output.section("Ansible results");
            ctx.output.raw(&summary.text);
        } else {
            ctx.output.info(&format!(
                "No failures in {} play(s)",
                report.plays.len()
            ));
        }

        Ok(if summary.had_failure { 1 } else { 0 })
    }
}
