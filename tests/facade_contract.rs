//! Binary contract tests: behaviors observable without a datastore.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn tools_server_refuses_without_identity() {
    Command::cargo_bin("architect-tools")
        .expect("binary built")
        .env_remove("ARCHITECT_AGENT_ID")
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ARCHITECT_AGENT_ID"));
}

#[test]
fn orchestrator_requires_a_prompt() {
    Command::cargo_bin("architect")
        .expect("binary built")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--prompt"));
}

#[test]
fn orchestrator_rejects_both_prompt_sources() {
    Command::cargo_bin("architect")
        .expect("binary built")
        .args(["--prompt", "do things", "--prompt-file", "/tmp/p.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("mutually exclusive"));
}

#[test]
fn orchestrator_fails_on_missing_prompt_file() {
    Command::cargo_bin("architect")
        .expect("binary built")
        .args(["--prompt-file", "/nonexistent/prompt.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("prompt file"));
}
