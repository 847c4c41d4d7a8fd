//! Hash command - print the content hash of a playbook

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use playbook_bridge::hash::{playbook_hash, playbook_roles};
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the hash command
#[derive(Parser, Debug, Clone)]
pub struct HashArgs {
    /// Path to the playbook file
    pub playbook: PathBuf,
}

impl HashArgs {
    /// Execute the hash command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let roles = playbook_roles(&self.playbook)?;
        let hash = playbook_hash(&self.playbook)?;

        if ctx.output.is_json() {
            ctx.output.json(&json!({
                "playbook": self.playbook.display().to_string(),
                "roles": roles,
                "hash": hash,
            }));
        } else {
            ctx.output.debug(&format!("Roles: {}", roles.join(", ")));
            println!("{}", hash);
        }

        Ok(0)
    }
}
