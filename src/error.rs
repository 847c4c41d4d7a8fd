//! Error types for Playbook Bridge.
//!
//! Errors are grouped by the stage of a run that produced them: configuration
//! problems are caught before the playbook binary is launched, invocation
//! problems stop the run before any output exists, decode problems mean the
//! tool's output could not be understood, and query problems are attributed to
//! the declared artifact query that failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::query::QueryError;

/// Result type alias for Playbook Bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Playbook Bridge.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Vault files were supplied without a password file to open them.
    #[error("Can't access vault file(s): missing 'vault_password_file'")]
    VaultPasswordMissing,

    /// Verbosity outside of the 0-6 range accepted by ansible-playbook.
    #[error("Verbosity must be between 0 and 6, got {0}")]
    InvalidVerbosity(u8),

    /// An extra variable could not be rendered as JSON.
    #[error("Couldn't convert value to JSON for extra variable '{key}': {source}")]
    ExtraVarEncoding {
        /// Variable name
        key: String,
        /// Serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The inventory could not be materialized.
    #[error("Failed to create inventory: {0}")]
    Inventory(String),

    // ========================================================================
    // Invocation Errors
    // ========================================================================
    /// The playbook binary could not be located.
    #[error("Playbook binary '{0}' not found")]
    BinaryNotFound(String),

    /// The playbook binary could not be started.
    #[error("Failed to start '{binary}': {source}")]
    Spawn {
        /// Binary that was launched
        binary: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// An output pipe was not available after spawning.
    #[error("Failed to attach to {0} of the playbook process")]
    StreamSetup(&'static str),

    /// Reading one of the output streams failed.
    #[error("Error reading {stream}: {source}")]
    StreamIo {
        /// Stream label (stdout or stderr)
        stream: &'static str,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the playbook process failed.
    #[error("Failed to wait for the playbook process: {0}")]
    Wait(#[source] std::io::Error),

    /// The run was cancelled by the caller; the process was killed.
    #[error("Playbook run was cancelled")]
    Cancelled,

    /// The run exceeded the caller's deadline; the process was killed.
    #[error("Playbook run timed out after {timeout_secs} seconds")]
    TimedOut {
        /// Timeout in seconds
        timeout_secs: u64,
    },

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// The execution report on stdout was not valid JSON of the expected shape.
    #[error("Error analyzing result JSON: {message}")]
    ReportDecode {
        /// Decoder message
        message: String,
        /// The raw captured output that failed to decode
        raw: String,
        /// Source error
        #[source]
        source: serde_json::Error,
    },

    // ========================================================================
    // Query Errors
    // ========================================================================
    /// An artifact query failed; the batch was aborted.
    #[error("Playbook artifact query '{name}' failed: {source}")]
    Query {
        /// Name of the declared query
        name: String,
        /// Query failure
        #[source]
        source: QueryError,
    },

    // ========================================================================
    // Hashing Errors
    // ========================================================================
    /// The playbook or one of its roles could not be hashed.
    #[error("Couldn't hash '{path}': {message}")]
    Hash {
        /// File or directory being hashed
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Creates a new report decode error carrying the raw output.
    pub fn report_decode(raw: impl Into<String>, source: serde_json::Error) -> Self {
        Self::ReportDecode {
            message: source.to_string(),
            raw: raw.into(),
            source,
        }
    }

    /// Creates a new query error attributed to `name`.
    pub fn query(name: impl Into<String>, source: QueryError) -> Self {
        Self::Query {
            name: name.into(),
            source,
        }
    }

    /// Creates a new hashing error.
    pub fn hash(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error was raised before the playbook was launched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::VaultPasswordMissing
                | Error::InvalidVerbosity(_)
                | Error::ExtraVarEncoding { .. }
                | Error::InvalidConfig { .. }
                | Error::Config(_)
                | Error::Inventory(_)
        )
    }

    /// Returns true if the error prevented the playbook from running to completion.
    pub fn is_invocation(&self) -> bool {
        matches!(
            self,
            Error::BinaryNotFound(_)
                | Error::Spawn { .. }
                | Error::StreamSetup(_)
                | Error::StreamIo { .. }
                | Error::Wait(_)
                | Error::Cancelled
                | Error::TimedOut { .. }
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            return 2;
        }
        if self.is_invocation() {
            return 3;
        }
        match self {
            Error::ReportDecode { .. } => 4,
            Error::Query { .. } => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(Error::VaultPasswordMissing.is_configuration());
        assert!(Error::InvalidVerbosity(7).is_configuration());
        assert!(!Error::Cancelled.is_configuration());
        assert_eq!(Error::VaultPasswordMissing.exit_code(), 2);
    }

    #[test]
    fn test_invocation_errors_are_classified() {
        let err = Error::BinaryNotFound("ansible-playbook".into());
        assert!(err.is_invocation());
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "Playbook binary 'ansible-playbook' not found");
    }

    #[test]
    fn test_report_decode_keeps_raw_output() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::report_decode("{oops", source);
        match &err {
            Error::ReportDecode { raw, .. } => assert_eq!(raw, "{oops"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().starts_with("Error analyzing result JSON"));
    }

    #[test]
    fn test_query_error_names_query() {
        let err = Error::query(
            "hostname",
            QueryError::MissingPath {
                path: ".plays[0].nope".into(),
            },
        );
        assert!(err.to_string().contains("'hostname'"));
        assert_eq!(err.exit_code(), 5);
    }
}
