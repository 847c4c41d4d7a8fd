//! Human-readable failure summary of an execution report.
//!
//! Rendering is a two-pass walk. The first pass only looks at `stats`: if no
//! host counts a failure or an unreachable signal, nothing is rendered. Once a
//! failure is detected, the second pass walks every play, task and host and
//! prints each host whose own result is failed or unreachable, regardless of
//! what `stats` said about that host.
//!
//! Indentation is a presentation detail, not a contract:
//!
//! ```text
//! PLAY <name>                      (0 spaces)
//!   TASK <name>                    (2)
//!     HOST <name>                  (4)
//!       Msg:    ...                (6)
//!       RESULTS                    (6)
//!         ITEM <item>              (8)
//!           Stderr: ...            (10)
//! ```
//!
//! Play and task headers are printed once per scope, and only when the scope
//! contains at least one failed or unreachable host.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::report::{ExecutionReport, HostResult, ItemResult, Message};

const INDENT: usize = 2;

/// Outcome of rendering a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureSummary {
    /// Whether `stats` counted any failure or unreachable host
    pub had_failure: bool,
    /// Rendered summary; empty when there was no failure
    pub text: String,
}

impl FailureSummary {
    /// True when nothing was rendered
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Render the failure summary for `report`.
pub fn render_failures(report: &ExecutionReport) -> FailureSummary {
    if !report.has_failure() {
        return FailureSummary::default();
    }

    debug!(
        failing_hosts = ?report.failing_hosts().collect::<Vec<_>>(),
        "Failure detected in execution report"
    );

    let mut out = Output::default();
    for play in &report.plays {
        let mut play_header_printed = false;
        for task in &play.tasks {
            let mut task_header_printed = false;
            for (host, result) in &task.hosts {
                if !result.is_interesting() {
                    continue;
                }
                if !play_header_printed {
                    out.line(0, &format!("PLAY <{}>", play.name()));
                    play_header_printed = true;
                }
                if !task_header_printed {
                    out.line(1, &format!("TASK <{}>", task.name()));
                    task_header_printed = true;
                }
                render_host(&mut out, host, result);
            }
        }
    }

    FailureSummary {
        had_failure: true,
        text: out.buf,
    }
}

fn render_host(out: &mut Output, host: &str, result: &HostResult) {
    if result.unreachable {
        out.line(2, &format!("HOST <{host}> (unreachable)"));
    } else {
        out.line(2, &format!("HOST <{host}>"));
    }

    out.fields(
        3,
        result.message.as_ref(),
        result.reason.as_deref(),
        result.stderr.as_deref(),
        result.stdout.as_deref(),
    );

    let mut failed_items = result.failed_items().peekable();
    if failed_items.peek().is_none() {
        return;
    }
    out.line(3, "RESULTS");
    for (index, item) in result
        .sub_results
        .iter()
        .flatten()
        .enumerate()
        .filter(|(_, item)| item.failed)
    {
        render_item(out, index, item);
    }
}

fn render_item(out: &mut Output, index: usize, item: &ItemResult) {
    let label = match &item.item {
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("#{index}"),
    };
    out.line(4, &format!("ITEM <{label}>"));
    out.fields(
        5,
        item.message.as_ref(),
        item.reason.as_deref(),
        item.stderr.as_deref(),
        item.stdout.as_deref(),
    );
}

#[derive(Default)]
struct Output {
    buf: String,
}

impl Output {
    fn line(&mut self, level: usize, text: &str) {
        self.buf.push_str(&" ".repeat(level * INDENT));
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn fields(
        &mut self,
        level: usize,
        message: Option<&Message>,
        reason: Option<&str>,
        stderr: Option<&str>,
        stdout: Option<&str>,
    ) {
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.field(level, "Msg", &message.to_string());
        }
        if let Some(reason) = reason {
            self.field(level, "Reason", reason);
        }
        if let Some(stderr) = stderr {
            self.field(level, "Stderr", stderr);
        }
        if let Some(stdout) = stdout {
            self.field(level, "Stdout", stdout);
        }
    }

    /// Multi-line values keep their continuation lines under the label.
    fn field(&mut self, level: usize, label: &str, value: &str) {
        let pad = " ".repeat(level * INDENT);
        let mut lines = value.trim_end_matches('\n').lines();
        let first = lines.next().unwrap_or_default();
        self.buf.push_str(&format!("{pad}{label}:\t{first}\n"));
        for rest in lines {
            self.buf.push_str(&format!("{pad}  {rest}\n"));
        }
    }
}
