//! Query command - evaluate path queries against a saved report

use super::{read_report, CommandContext, QueryDeclArgs};
use anyhow::{bail, Result};
use clap::Parser;
use playbook_bridge::query::query_artifacts;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the query command
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Path to the JSON report
    pub report: PathBuf,

    #[command(flatten)]
    pub queries: QueryDeclArgs,
}

impl QueryArgs {
    /// Execute the query command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut queries = self.queries.to_queries()?;
        if queries.is_empty() {
            bail!("at least one --query NAME=PATH is required");
        }

        let raw = read_report(&self.report)?;
        query_artifacts(&raw, &mut queries)?;

        if ctx.output.is_json() {
            let results: serde_json::Map<_, _> = queries
                .iter()
                .map(|(name, query)| (name.clone(), json!(query.result)))
                .collect();
            ctx.output.json(&serde_json::Value::Object(results));
        } else {
            for (name, query) in &queries {
                ctx.output.key_value(name, &query.result);
            }
        }

        Ok(0)
    }
}
