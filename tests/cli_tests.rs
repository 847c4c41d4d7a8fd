//! CLI tests for playbook-bridge
//!
//! Covers the subcommands end to end with assert_cmd:
//! - Argument vector printing
//! - Failure analysis of saved reports
//! - Queries against saved reports
//! - Playbook hashing
//! - Running a fake playbook binary

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;

// Helper to get an isolated command for testing
fn bridge_cmd(sandbox: &Sandbox) -> Command {
    let mut cmd = Command::cargo_bin("playbook-bridge").unwrap();
    cmd.current_dir(sandbox.path())
        .env("XDG_CONFIG_HOME", sandbox.path().join("config"))
        .env_remove("PLAYBOOK_BRIDGE_CONFIG")
        .env_remove("PLAYBOOK_BRIDGE_BINARY")
        .env_remove("PLAYBOOK_BRIDGE_STORE_OUTPUT")
        .env_remove("PLAYBOOK_BRIDGE_TIMEOUT")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

// ============================================================================
// Help and Version
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("hash"));
}

#[test]
fn test_version() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_fails() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox).arg("frobnicate").assert().failure();
}

// ============================================================================
// Args
// ============================================================================

#[test]
fn test_args_prints_one_argument_per_line() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["args", "site.yml", "--tags", "web", "-e", "user=deploy"])
        .args(["--extra-json", "port=8080", "--inventory-file", "hosts"])
        .assert()
        .success()
        .stdout("--tags\nweb\n-e\n{\"port\":8080}\n-e\nuser=deploy\nsite.yml\n-i\nhosts\n");
}

#[test]
fn test_args_json_output() {
    let sandbox = Sandbox::new();
    let output = bridge_cmd(&sandbox)
        .args(["--output", "json", "args", "site.yml", "--check"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["binary"], "ansible-playbook");
    assert_eq!(value["args"], serde_json::json!(["--check", "site.yml"]));
}

#[test]
fn test_args_vault_without_password_is_a_configuration_error() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["args", "site.yml", "--vault-file", "secrets.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("vault_password_file"));
}

#[test]
fn test_args_malformed_extra_var() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["args", "site.yml", "-e", "novalue"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

// ============================================================================
// Analyze
// ============================================================================

#[test]
fn test_analyze_failed_report() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", FAILED_REPORT);
    bridge_cmd(&sandbox)
        .arg("analyze")
        .arg(&report)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("PLAY <Deploy>"))
        .stdout(predicate::str::contains("HOST <web2> (unreachable)"))
        .stdout(predicate::str::contains("Prepare").not());
}

#[test]
fn test_analyze_clean_report() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    bridge_cmd(&sandbox)
        .arg("analyze")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("PLAY").not());
}

#[test]
fn test_analyze_json_lists_failing_hosts() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", FAILED_REPORT);
    let output = bridge_cmd(&sandbox)
        .args(["--output", "json", "analyze"])
        .arg(&report)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["had_failure"], true);
    assert_eq!(value["failing_hosts"], serde_json::json!(["web1", "web2"]));
}

#[test]
fn test_analyze_garbage_is_a_decode_error() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", "PLAY [all] ****\n");
    bridge_cmd(&sandbox)
        .arg("analyze")
        .arg(&report)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Error analyzing result JSON"));
}

#[test]
fn test_analyze_missing_file() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["analyze", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read report"));
}

// ============================================================================
// Query
// ============================================================================

#[test]
fn test_query_prints_results_in_declaration_order() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    bridge_cmd(&sandbox)
        .arg("query")
        .arg(&report)
        .args(["-q", "play=.plays[0].play.name"])
        .args(["-q", "ports=..ansible_facts.port"])
        .assert()
        .success()
        .stdout("play = Configure web\nports = 8080 8081\n");
}

#[test]
fn test_query_json_results() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    let output = bridge_cmd(&sandbox)
        .args(["--output", "json", "query"])
        .arg(&report)
        .args(["-q", "ports=..ansible_facts.port", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["ports"], "[8080,8081]");
}

#[test]
fn test_query_strict_missing_path() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    bridge_cmd(&sandbox)
        .arg("query")
        .arg(&report)
        .args(["-q", "nope=.plays[0].missing", "--strict"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_query_requires_a_declaration() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    bridge_cmd(&sandbox)
        .arg("query")
        .arg(&report)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--query"));
}

#[test]
fn test_query_duplicate_name() {
    let sandbox = Sandbox::new();
    let report = sandbox.write("report.json", CLEAN_REPORT);
    bridge_cmd(&sandbox)
        .arg("query")
        .arg(&report)
        .args(["-q", "x=.plays", "-q", "x=.stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("declared twice"));
}

// ============================================================================
// Hash
// ============================================================================

#[test]
fn test_hash_is_stable_hex() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.playbook_with_roles(&["web", "db"]);

    let first = bridge_cmd(&sandbox).arg("hash").arg(&playbook).output().unwrap();
    let second = bridge_cmd(&sandbox).arg("hash").arg(&playbook).output().unwrap();
    assert!(first.status.success());

    let hash = String::from_utf8(first.stdout.clone()).unwrap();
    let hash = hash.trim();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_hash_json_lists_roles() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.playbook_with_roles(&["web", "db"]);
    let output = bridge_cmd(&sandbox)
        .args(["--output", "json", "hash"])
        .arg(&playbook)
        .output()
        .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["roles"], serde_json::json!(["web", "db"]));
}

#[test]
fn test_hash_missing_role_directory() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.write("site.yml", "- hosts: all\n  roles: [ghost]\n");
    bridge_cmd(&sandbox)
        .arg("hash")
        .arg(&playbook)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

// ============================================================================
// Run
// ============================================================================

#[cfg(unix)]
#[test]
fn test_run_with_fake_binary_and_query() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.write("site.yml", "- hosts: all\n");
    let bin = sandbox.fake_playbook(CLEAN_REPORT, 0);

    bridge_cmd(&sandbox)
        .arg("run")
        .arg(&playbook)
        .arg("--binary")
        .arg(&bin)
        .args(["--inventory-file", "hosts"])
        .args(["-q", "port=.plays[0].tasks[0].hosts.web2.ansible_facts.port"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 8081"));
}

#[cfg(unix)]
#[test]
fn test_run_failed_playbook() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.write("site.yml", "- hosts: all\n");
    let bin = sandbox.fake_playbook(FAILED_REPORT, 2);

    bridge_cmd(&sandbox)
        .arg("run")
        .arg(&playbook)
        .arg("--binary")
        .arg(&bin)
        .args(["--inventory", "all:\n  hosts:\n    web1:\n"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Ansible playbook command finished with an error: exit status 2",
        ))
        .stderr(predicate::str::contains("HOST <web1>"));
}

#[cfg(unix)]
#[test]
fn test_run_ignored_failure_exits_zero() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.write("site.yml", "- hosts: all\n");
    let bin = sandbox.fake_playbook(FAILED_REPORT, 2);

    bridge_cmd(&sandbox)
        .arg("run")
        .arg(&playbook)
        .arg("--binary")
        .arg(&bin)
        .args(["--inventory-file", "hosts", "--ignore-failure"])
        .assert()
        .success()
        .stderr(predicate::str::contains("WARNING"));
}

#[cfg(unix)]
#[test]
fn test_run_json_outcome() {
    let sandbox = Sandbox::new();
    let playbook = sandbox.write("site.yml", "- hosts: all\n");
    let bin = sandbox.fake_playbook(CLEAN_REPORT, 0);

    let output = bridge_cmd(&sandbox)
        .args(["--output", "json", "run"])
        .arg(&playbook)
        .arg("--binary")
        .arg(&bin)
        .args(["--inventory-file", "hosts", "--store-output"])
        .args(["-q", "name=.plays[0].play.name"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["exit_code"], 0);
    assert_eq!(value["had_failure"], false);
    assert_eq!(value["queries"]["name"]["result"], "Configure web");
    assert!(value["stdout"].as_str().unwrap().contains("\"plays\""));
}

#[test]
fn test_run_missing_playbook() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["run", "missing.yml", "--inventory-file", "hosts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Playbook file not found"));
}

#[test]
fn test_run_inventory_flags_conflict() {
    let sandbox = Sandbox::new();
    bridge_cmd(&sandbox)
        .args(["run", "site.yml", "--inventory-file", "hosts", "--inventory", "all: {}"])
        .assert()
        .failure();
}
