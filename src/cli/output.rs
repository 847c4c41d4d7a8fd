//! Output formatting for the playbook-bridge CLI
//!
//! Human mode prints colored, prefixed lines. JSON mode prints one JSON
//! object per message so the output can be piped into other tools.

use colored::Colorize;
use serde_json::json;
use std::io::{self, Write};

use playbook_bridge::diagnostics::{Diagnostic, Severity};
use playbook_bridge::runner::{OutputLine, StreamKind};

/// Output formatter for different output modes
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON output was requested
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let line = "=".repeat(title.len() + 4);
        if self.use_color {
            println!("\n{}", line.bright_blue());
            println!("{}", format!("  {}  ", title).bright_blue().bold());
            println!("{}\n", line.bright_blue());
        } else {
            println!("\n{}", line);
            println!("  {}  ", title);
            println!("{}\n", line);
        }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("\n{}", title.cyan().bold());
            println!("{}", "-".repeat(title.len()).cyan());
        } else {
            println!("\n{}", title);
            println!("{}", "-".repeat(title.len()));
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", json!({ "type": "error", "message": message }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            eprintln!("{}", json!({ "type": "warning", "message": message }));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "DEBUG:".magenta(), message);
        } else {
            println!("DEBUG: {}", message);
        }
    }

    /// Print a diagnostic with its detail block indented underneath
    pub fn diagnostic(&self, diagnostic: &Diagnostic) {
        if self.json_mode {
            eprintln!(
                "{}",
                serde_json::to_string(diagnostic).unwrap_or_else(|_| diagnostic.summary.clone())
            );
            return;
        }

        let mut summary = diagnostic.summary.clone();
        if let Some(attribute) = &diagnostic.attribute {
            summary.push_str(&format!(" (at {attribute})"));
        }
        match diagnostic.severity {
            Severity::Error => self.error(&summary),
            Severity::Warning => self.warning(&summary),
        }

        for line in diagnostic.detail.lines() {
            if self.use_color {
                eprintln!("    {}", line.bright_black());
            } else {
                eprintln!("    {}", line);
            }
        }
    }

    /// Echo one line of playbook output as it arrives
    pub fn stream_line(&self, line: &OutputLine) {
        if self.json_mode {
            return;
        }

        match (line.stream, self.use_color) {
            (StreamKind::Stdout, true) => println!("{} {}", "|".bright_black(), line.line),
            (StreamKind::Stdout, false) => println!("| {}", line.line),
            (StreamKind::Stderr, true) => eprintln!("{} {}", "!".yellow(), line.line),
            (StreamKind::Stderr, false) => eprintln!("! {}", line.line),
        }
    }

    /// Print a `name = value` pair
    pub fn key_value(&self, key: &str, value: &str) {
        if self.use_color {
            println!("{} = {}", key.bright_white().bold(), value);
        } else {
            println!("{} = {}", key, value);
        }
    }

    /// Print a value as pretty JSON
    pub fn json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("couldn't encode output: {e}")),
        }
    }

    /// Print raw text without any decoration
    pub fn raw(&self, text: &str) {
        print!("{}", text);
        if !text.ends_with('\n') && !text.is_empty() {
            println!();
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
