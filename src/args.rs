//! Argument construction for `ansible-playbook`.
//!
//! [`PlaybookOptions`] holds everything a resource declaration can say about
//! how a playbook is invoked. [`PlaybookOptions::build_args`] turns it into the
//! argument vector handed to the process runner. The order of the vector is
//! fixed:
//!
//! ```text
//! -v…  --force-handlers  -e hostname=<name>  --tags a,b  --limit x,y
//! --check  --diff  -e @<var file>…  -e @<vault file>… --vault-id <id>@<pw file>
//! -e k=v | -e {"k":…}…  <playbook>  -i <inventory>
//! ```
//!
//! Extra variables are kept in a [`BTreeMap`], so the vector never depends on
//! the order in which variables were declared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{Error, Result};

/// Default name of the playbook binary.
pub const DEFAULT_BINARY: &str = "ansible-playbook";

/// Highest verbosity accepted by `ansible-playbook` (`-vvvvvv`).
pub const MAX_VERBOSITY: u8 = 6;

/// Ansible Vault settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultOptions {
    /// Encrypted variable files, passed as `-e @<file>`
    pub files: Vec<String>,
    /// File holding the vault password
    pub password_file: Option<String>,
    /// Vault identity label
    pub vault_id: Option<String>,
}

impl VaultOptions {
    /// Render the single `--vault-id` value, `<id>@<password file>`. Without
    /// an identity the id part is left empty, giving `@<password file>`.
    fn vault_id_arg(&self) -> Result<String> {
        let password_file = self
            .password_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(Error::VaultPasswordMissing)?;

        let id = self.vault_id.as_deref().unwrap_or_default();
        Ok(format!("{id}@{password_file}"))
    }
}

/// Typed invocation settings for one playbook run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybookOptions {
    /// Path to the playbook
    pub playbook: String,
    /// Inventory reference passed with `-i` (a file path, not inventory content)
    pub inventory: Option<String>,
    /// Desired host name, exposed to the playbook as the `hostname` variable
    pub name: Option<String>,
    /// Verbosity between 0 and 6
    pub verbosity: u8,
    /// Run handlers even if a task fails
    pub force_handlers: bool,
    /// Predict changes without making them
    pub check_mode: bool,
    /// Show differences in changed files
    pub diff_mode: bool,
    /// Only run plays and tasks tagged with these values
    pub tags: Vec<String>,
    /// Limit the run to these hosts or patterns
    pub limit: Vec<String>,
    /// Variable files, passed as `-e @<file>`
    pub var_files: Vec<String>,
    /// Vault settings
    pub vault: VaultOptions,
    /// Extra variables; strings are passed as `key=value`, anything else as JSON
    pub extra_vars: BTreeMap<String, JsonValue>,
}

impl PlaybookOptions {
    /// Create options for the given playbook path
    pub fn new(playbook: impl Into<String>) -> Self {
        Self {
            playbook: playbook.into(),
            ..Self::default()
        }
    }

    /// Set the inventory reference
    pub fn with_inventory(mut self, inventory: impl Into<String>) -> Self {
        self.inventory = Some(inventory.into());
        self
    }

    /// Set the verbosity level
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a host limit
    pub fn with_limit(mut self, limit: impl Into<String>) -> Self {
        self.limit.push(limit.into());
        self
    }

    /// Add a variable file
    pub fn with_var_file(mut self, path: impl Into<String>) -> Self {
        self.var_files.push(path.into());
        self
    }

    /// Add an extra variable
    pub fn with_extra_var(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra_vars.insert(key.into(), value.into());
        self
    }

    /// Set the vault settings
    pub fn with_vault(mut self, vault: VaultOptions) -> Self {
        self.vault = vault;
        self
    }

    /// Build the ordered argument vector.
    ///
    /// Fails before anything is launched when vault files are given without a
    /// password file, or when the verbosity is out of range.
    pub fn build_args(&self) -> Result<Vec<String>> {
        let mut args = Vec::new();

        if self.verbosity > MAX_VERBOSITY {
            return Err(Error::InvalidVerbosity(self.verbosity));
        }
        if let Some(verbose) = verbose_switch(self.verbosity) {
            args.push(verbose);
        }

        if self.force_handlers {
            args.push("--force-handlers".to_string());
        }

        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            args.push("-e".to_string());
            args.push(format!("hostname={name}"));
        }

        if !self.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(self.tags.join(","));
        }

        if !self.limit.is_empty() {
            args.push("--limit".to_string());
            args.push(self.limit.join(","));
        }

        if self.check_mode {
            args.push("--check".to_string());
        }

        if self.diff_mode {
            args.push("--diff".to_string());
        }

        for var_file in &self.var_files {
            args.push("-e".to_string());
            args.push(format!("@{var_file}"));
        }

        if !self.vault.files.is_empty() {
            let vault_id = self.vault.vault_id_arg()?;
            for vault_file in &self.vault.files {
                args.push("-e".to_string());
                args.push(format!("@{vault_file}"));
            }
            args.push("--vault-id".to_string());
            args.push(vault_id);
        }

        for (key, value) in &self.extra_vars {
            args.push("-e".to_string());
            args.push(render_extra_var(key, value)?);
        }

        args.push(self.playbook.clone());

        if let Some(inventory) = &self.inventory {
            args.push("-i".to_string());
            args.push(inventory.clone());
        }

        debug!(args = ?args, "Built playbook arguments");
        Ok(args)
    }
}

/// Create the verbosity switch, e.g. `2` becomes `-vv`. Zero yields nothing.
pub fn verbose_switch(verbosity: u8) -> Option<String> {
    if verbosity == 0 {
        return None;
    }
    Some(format!("-{}", "v".repeat(verbosity as usize)))
}

/// Render one extra variable. Strings stay `key=value`; any other value is
/// wrapped in a one-entry JSON object so ansible keeps its type.
fn render_extra_var(key: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(format!("{key}={s}")),
        other => {
            let mut single = serde_json::Map::new();
            single.insert(key.to_string(), other.clone());
            serde_json::to_string(&single).map_err(|source| Error::ExtraVarEncoding {
                key: key.to_string(),
                source,
            })
        }
    }
}
