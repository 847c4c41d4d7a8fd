//! # Playbook Bridge - run ansible-playbook and make sense of what it reports
//!
//! Playbook Bridge drives `ansible-playbook` on behalf of a provisioning tool.
//! It turns typed options into a command line, runs the playbook with the
//! JSON stdout callback, and interprets the report that comes back.
//!
//! ## Core Concepts
//!
//! - **Options**: typed invocation settings, turned into an ordered argument vector
//! - **Runner**: launches the binary and drains stdout and stderr concurrently
//! - **Report**: the JSON execution report, decoded into plays, tasks and hosts
//! - **Failure summary**: a readable block listing every failed or unreachable host
//! - **Artifact queries**: named path expressions evaluated against the raw report
//! - **Diagnostics**: errors and warnings collected over a run instead of aborting it
//!
//! ## Architecture Overview
//!
//! ```text
//! PlaybookOptions ──build_args──▶ Vec<String>
//!                                     │
//!                                     ▼
//!                              ProcessRunner::run ──▶ stdout / stderr
//!                                                        │
//!                          ┌─────────────────────────────┼──────────────────┐
//!                          ▼                             ▼                  ▼
//!                   parse_report                  query_artifacts     stderr warning
//!                          │                             │
//!                          ▼                             ▼
//!                   render_failures               ArtifactQuery.result
//! ```
//!
//! [`pipeline::execute`] wires the stages together and folds every problem
//! into [`diagnostics::Diagnostics`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use indexmap::IndexMap;
//! use playbook_bridge::prelude::*;
//!
//! # async fn example() {
//! let options = PlaybookOptions::new("site.yml").with_tag("web");
//! let request = ExecutionRequest::new(options)
//!     .with_inventory_content("all:\n  hosts:\n    web1:\n");
//!
//! let mut queries = IndexMap::new();
//! queries.insert("port".to_string(), ArtifactQuery::new("..ansible_facts.port"));
//!
//! let outcome = execute(&request, &mut queries).await;
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! println!("port = {}", queries["port"].result);
//! # }
//! ```

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::args::{PlaybookOptions, VaultOptions};
    pub use crate::config::Config;
    pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{execute, ExecutionOutcome, ExecutionRequest, InventorySource, RunRecord};
    pub use crate::query::{query_artifacts, ArtifactQuery};
    pub use crate::render::{render_failures, FailureSummary};
    pub use crate::report::{parse_report, ExecutionReport, Message};
    pub use crate::runner::{OutputLine, ProcessOutput, ProcessRunner, StreamKind};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Diagnostics collected over a run.
pub mod diagnostics;

/// Configuration loading and merging.
pub mod config;

// ============================================================================
// Invocation
// ============================================================================

/// Argument construction for `ansible-playbook`.
pub mod args;

/// Temporary inventory files.
pub mod inventory;

/// Process runner with concurrent stream draining.
pub mod runner;

// ============================================================================
// Interpretation
// ============================================================================

/// Execution report model and decoder.
pub mod report;

/// Failure summary rendering.
pub mod render;

/// Path queries over the raw report.
pub mod query;

/// Content hash of a playbook and its roles.
pub mod hash;

/// End-to-end execution.
pub mod pipeline;

pub use error::{Error, Result};
