//! Configuration module for Playbook Bridge
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - User configuration (~/.config/playbook-bridge/config.toml)
//! - Project configuration (./playbook-bridge.toml)
//! - An explicit file given on the command line
//! - Environment variables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::args::DEFAULT_BINARY;
use crate::error::{Error, Result};
use crate::runner::{STDOUT_CALLBACK_JSON, STDOUT_CALLBACK_VAR};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "playbook-bridge.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Environment variables passed to the playbook binary
    pub environment: BTreeMap<String, String>,
}

/// Default execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Playbook binary, a name on PATH or a path
    pub binary: String,

    /// Keep the raw execution report after a successful run
    pub store_output: bool,

    /// Leave temporary inventory files on disk
    pub keep_inventory: bool,

    /// Kill the playbook after this many seconds
    pub timeout_secs: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            store_output: false,
            keep_inventory: false,
            timeout_secs: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when neither `-v` nor `RUST_LOG` says otherwise
    pub level: String,

    /// Echo playbook output lines to the terminal while it runs
    pub stream_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            stream_output: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge(Self::from_file(&path)?);
            }
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Get the list of configuration file paths to check, lowest priority first
    fn get_config_paths(explicit_path: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.to_path_buf()];
        }

        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("playbook-bridge").join("config.toml"));
        }
        paths.push(PathBuf::from(PROJECT_CONFIG_FILE));
        paths
    }

    /// Parse a single configuration file, picking the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Merge another config into this one; `other` wins for non-default values
    fn merge(self, other: Config) -> Config {
        let defaults = Defaults::default();
        let logging = LoggingConfig::default();

        Config {
            defaults: Defaults {
                binary: if other.defaults.binary != defaults.binary {
                    other.defaults.binary
                } else {
                    self.defaults.binary
                },
                store_output: other.defaults.store_output || self.defaults.store_output,
                keep_inventory: other.defaults.keep_inventory || self.defaults.keep_inventory,
                timeout_secs: other.defaults.timeout_secs.or(self.defaults.timeout_secs),
            },
            logging: LoggingConfig {
                level: if other.logging.level != logging.level {
                    other.logging.level
                } else {
                    self.logging.level
                },
                stream_output: other.logging.stream_output || self.logging.stream_output,
            },
            environment: {
                let mut env = self.environment;
                env.extend(other.environment);
                env
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // PLAYBOOK_BRIDGE_BINARY
        if let Ok(binary) = std::env::var("PLAYBOOK_BRIDGE_BINARY") {
            if !binary.is_empty() {
                self.defaults.binary = binary;
            }
        }

        // PLAYBOOK_BRIDGE_STORE_OUTPUT
        if let Ok(value) = std::env::var("PLAYBOOK_BRIDGE_STORE_OUTPUT") {
            self.defaults.store_output = parse_bool("PLAYBOOK_BRIDGE_STORE_OUTPUT", &value)?;
        }

        // PLAYBOOK_BRIDGE_TIMEOUT
        if let Ok(value) = std::env::var("PLAYBOOK_BRIDGE_TIMEOUT") {
            let secs = value.parse().map_err(|_| Error::InvalidConfig {
                key: "PLAYBOOK_BRIDGE_TIMEOUT".to_string(),
                message: format!("expected a number of seconds, got '{value}'"),
            })?;
            self.defaults.timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// Timeout for a run, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.defaults
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Environment for the playbook binary. The JSON stdout callback is
    /// always selected, whatever the configuration says.
    pub fn playbook_env(&self) -> BTreeMap<String, String> {
        let mut env = self.environment.clone();
        env.insert(
            STDOUT_CALLBACK_VAR.to_string(),
            STDOUT_CALLBACK_JSON.to_string(),
        );
        env
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::InvalidConfig {
            key: key.to_string(),
            message: format!("expected a boolean, got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.binary, "ansible-playbook");
        assert!(!config.defaults.store_output);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            environment: BTreeMap::from([("A".to_string(), "1".to_string())]),
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                binary: "/opt/ansible/bin/ansible-playbook".to_string(),
                timeout_secs: Some(30),
                ..Defaults::default()
            },
            environment: BTreeMap::from([("B".to_string(), "2".to_string())]),
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.binary, "/opt/ansible/bin/ansible-playbook");
        assert_eq!(merged.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(merged.environment.len(), 2);
    }

    #[test]
    fn test_callback_cannot_be_overridden() {
        let config = Config {
            environment: BTreeMap::from([(
                "ANSIBLE_STDOUT_CALLBACK".to_string(),
                "yaml".to_string(),
            )]),
            ..Config::default()
        };
        assert_eq!(config.playbook_env()["ANSIBLE_STDOUT_CALLBACK"], "json");
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[defaults]\nstore_output = true\n\n[environment]\nANSIBLE_FORCE_COLOR = \"0\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.defaults.store_output);
        assert_eq!(config.defaults.binary, "ansible-playbook");
        assert_eq!(config.environment["ANSIBLE_FORCE_COLOR"], "0");
    }

    #[test]
    #[serial_test::serial]
    fn test_env_override() {
        std::env::set_var("PLAYBOOK_BRIDGE_TIMEOUT", "20");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.defaults.timeout_secs, Some(20));
        std::env::remove_var("PLAYBOOK_BRIDGE_TIMEOUT");
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_env_override() {
        std::env::set_var("PLAYBOOK_BRIDGE_STORE_OUTPUT", "maybe");
        let mut config = Config::default();
        let err = config.apply_env_overrides().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        std::env::remove_var("PLAYBOOK_BRIDGE_STORE_OUTPUT");
    }
}
