//! Artifact queries over the raw execution report.
//!
//! Queries are evaluated against the untyped JSON document captured on
//! stdout, not against the typed [`ExecutionReport`](crate::report::ExecutionReport),
//! so they can reach fields the typed model does not carry (facts, module
//! return values and so on).
//!
//! A batch of queries either succeeds as a whole or leaves every `result`
//! untouched: results are collected first and written back only once every
//! query has evaluated.

mod path;

pub use path::JsonPath;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Failure of a single query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The expression could not be compiled.
    #[error("invalid path expression at position {position}: {message}")]
    Syntax {
        /// Character offset of the problem
        position: usize,
        /// What was expected
        message: String,
    },

    /// Strict query selected nothing.
    #[error("'{path}' did not match anything in the execution report")]
    MissingPath {
        /// The expression that did not match
        path: String,
    },

    /// Matched values could not be encoded as JSON.
    #[error("couldn't encode query result as JSON: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A named extraction request against the execution report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactQuery {
    /// Path expression
    #[serde(alias = "jsonpath")]
    pub path: String,
    /// Fail when the path selects nothing instead of yielding an empty string
    #[serde(default, alias = "fail_on_missing_key")]
    pub fail_on_missing_path: bool,
    /// Emit matches as JSON instead of plain text
    #[serde(default, alias = "json_output")]
    pub as_json: bool,
    /// Output of the last successful evaluation
    #[serde(default)]
    pub result: String,
}

impl ArtifactQuery {
    /// Create a tolerant, text-mode query.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Fail instead of yielding `""` when nothing matches
    pub fn strict(mut self) -> Self {
        self.fail_on_missing_path = true;
        self
    }

    /// Emit JSON instead of plain text
    pub fn json(mut self) -> Self {
        self.as_json = true;
        self
    }

    /// Evaluate against an already-decoded document.
    ///
    /// Text mode writes strings verbatim and any other value as compact JSON,
    /// joined by single spaces. JSON mode writes a single match as-is and
    /// several matches as an array. A tolerant query that matches nothing
    /// yields an empty string in both modes.
    pub fn evaluate(&self, document: &JsonValue) -> std::result::Result<String, QueryError> {
        let path = JsonPath::compile(&self.path)?;
        let matches = path.select(document);
        trace!(path = %path, matches = matches.len(), "Evaluated artifact query");

        if matches.is_empty() {
            if self.fail_on_missing_path {
                return Err(QueryError::MissingPath {
                    path: self.path.clone(),
                });
            }
            return Ok(String::new());
        }

        if self.as_json {
            let encoded = match matches.as_slice() {
                [single] => serde_json::to_string(single),
                many => serde_json::to_string(many),
            };
            return encoded.map_err(QueryError::Serialize);
        }

        let parts: Vec<String> = matches
            .into_iter()
            .map(|value| match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        Ok(parts.join(" "))
    }
}

/// Evaluate every query in declaration order against the captured stdout.
///
/// The first failing query aborts the batch with an error naming it; no
/// result is written in that case. An empty batch never looks at `stdout`.
pub fn query_artifacts(stdout: &[u8], queries: &mut IndexMap<String, ArtifactQuery>) -> Result<()> {
    if queries.is_empty() {
        return Ok(());
    }

    let document: JsonValue = serde_json::from_slice(stdout)
        .map_err(|e| Error::report_decode(String::from_utf8_lossy(stdout), e))?;

    let mut results = Vec::with_capacity(queries.len());
    for (name, query) in queries.iter() {
        let result = query
            .evaluate(&document)
            .map_err(|source| Error::query(name, source))?;
        debug!(query = %name, path = %query.path, "Artifact query succeeded");
        results.push(result);
    }

    for (query, result) in queries.values_mut().zip(results) {
        query.result = result;
    }
    Ok(())
}
