//! Args command - show the ansible-playbook command line
//!
//! Builds the argument vector exactly as `run` would, without launching
//! anything. Useful to check vault and extra variable handling.

use super::{CommandContext, PlaybookArgs};
use anyhow::Result;
use clap::Parser;
use serde_json::json;

/// Arguments for the args command
#[derive(Parser, Debug, Clone)]
pub struct ArgsArgs {
    #[command(flatten)]
    pub playbook: PlaybookArgs,

    /// Inventory reference appended with -i
    #[arg(long)]
    pub inventory_file: Option<String>,
}

impl ArgsArgs {
    /// Execute the args command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut options = self.playbook.to_options()?;
        options.inventory = self.inventory_file.clone();

        let args = options.build_args()?;

        if ctx.output.is_json() {
            ctx.output.json(&json!({
                "binary": ctx.config.defaults.binary,
                "args": args,
            }));
        } else {
            ctx.output
                .debug(&format!("Binary: {}", ctx.config.defaults.binary));
            for arg in &args {
                println!("{}", arg);
            }
        }

        Ok(0)
    }
}
