//! CLI surface tests for the aibud binary

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("aibud")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("models"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("aibud")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aibud"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("aibud").unwrap().assert().failure();
}

#[test]
fn invalid_provider_is_rejected() {
    Command::cargo_bin("aibud")
        .unwrap()
        .args(["models", "--provider", "bedrock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid provider type"));
}

#[test]
fn chat_help_shows_search_flag() {
    Command::cargo_bin("aibud")
        .unwrap()
        .args(["chat", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--search"));
}
