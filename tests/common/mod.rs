//! Shared test utilities and fixtures for the playbook-bridge test suite.
//!
//! This module provides:
//! - JSON execution report fixtures
//! - A fake `ansible-playbook` writer backed by `/bin/sh` scripts
//! - Playbook project scaffolding in temporary directories
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

// ============================================================================
// Report Fixtures
// ============================================================================

/// A clean run: one play, one task, every host ok.
pub const CLEAN_REPORT: &str = r#"{
    "plays": [
        {
            "play": {"name": "Configure web", "id": "a1"},
            "tasks": [
                {
                    "task": {"name": "Gather port", "id": "b1"},
                    "hosts": {
                        "web1": {"changed": false, "ansible_facts": {"port": 8080}, "msg": "ok"},
                        "web2": {"changed": false, "ansible_facts": {"port": 8081}}
                    }
                }
            ]
        }
    ],
    "stats": {
        "web1": {"ok": 1, "changed": 0, "failures": 0, "unreachable": 0, "skipped": 0, "rescued": 0, "ignored": 0},
        "web2": {"ok": 1, "changed": 0, "failures": 0, "unreachable": 0, "skipped": 0, "rescued": 0, "ignored": 0}
    }
}"#;

/// Two plays; only the second has failed and unreachable hosts.
pub const FAILED_REPORT: &str = r#"{
    "plays": [
        {
            "play": {"name": "Prepare"},
            "tasks": [
                {"task": {"name": "ping"}, "hosts": {"db1": {"ping": "pong"}, "web1": {"ping": "pong"}}}
            ]
        },
        {
            "play": {"name": "Deploy"},
            "tasks": [
                {
                    "task": {"name": "Install packages"},
                    "hosts": {
                        "web1": {"failed": true, "msg": ["No package matching 'nginx'", "see log"], "rc": 1},
                        "db1": {"changed": true},
                        "web2": {"unreachable": true, "msg": "Failed to connect to the host via ssh"}
                    }
                },
                {
                    "task": {"name": "Restart"},
                    "hosts": {
                        "web1": {"failed": true, "stderr": "unit not found\nexit 5", "stdout": ""}
                    }
                }
            ]
        }
    ],
    "stats": {
        "db1": {"ok": 2, "failures": 0, "unreachable": 0},
        "web1": {"ok": 1, "failures": 2, "unreachable": 0},
        "web2": {"ok": 1, "failures": 0, "unreachable": 1}
    }
}"#;

/// Per-host flags set, but `stats` says nothing failed.
pub const STATS_CLEAN_FLAGS_FAILED: &str = r#"{
    "plays": [
        {"play": {"name": "P"}, "tasks": [
            {"task": {"name": "T"}, "hosts": {"h1": {"failed": true, "msg": "ignored"}}}
        ]}
    ],
    "stats": {"h1": {"failures": 0, "unreachable": 0, "ignored": 1}}
}"#;

/// A clean package install. The package module lists its transaction as
/// plain strings under `results` and reports an object under `msg` for the
/// second host.
pub const PACKAGE_REPORT: &str = r#"{
    "plays": [
        {"play": {"name": "Packages"}, "tasks": [
            {"task": {"name": "Install nginx"}, "hosts": {
                "web1": {"changed": true, "msg": "", "rc": 0,
                         "results": ["Installed: nginx-1.20.1-1.el9.x86_64"]},
                "web2": {"changed": false, "msg": {"rc": 0}, "rc": 0, "results": []}
            }}
        ]}
    ],
    "stats": {
        "web1": {"ok": 1, "changed": 1, "failures": 0, "unreachable": 0},
        "web2": {"ok": 1, "changed": 0, "failures": 0, "unreachable": 0}
    }
}"#;

// ============================================================================
// Fake Playbook Binary
// ============================================================================

/// Scratch directory holding fake binaries and playbook projects.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    /// Create a new sandbox
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create sandbox"),
        }
    }

    /// Root of the sandbox
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an executable `/bin/sh` script and return its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        make_executable(&path);
        path
    }

    /// A fake binary that prints `report` on stdout and exits with `code`.
    pub fn fake_playbook(&self, report: &str, code: i32) -> PathBuf {
        let report_path = self.write("report.json", report);
        self.script(
            "fake-ansible-playbook",
            &format!("cat '{}'\nexit {code}", report_path.display()),
        )
    }

    /// Write a file relative to the sandbox root
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// A playbook using the given roles, with one task file per role
    pub fn playbook_with_roles(&self, roles: &[&str]) -> PathBuf {
        let list = roles.join(", ");
        for role in roles {
            self.write(
                &format!("roles/{role}/tasks/main.yml"),
                &format!("- name: {role}\n  ping:\n"),
            );
        }
        self.write("site.yml", &format!("- hosts: all\n  roles: [{list}]\n"))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Count how often `needle` occurs in `haystack`
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
