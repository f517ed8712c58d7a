//! CLI tests for the ms binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ms(store: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ms").expect("ms binary should build");
    cmd.env("NO_COLOR", "1").arg("--store").arg(store.path());
    cmd
}

#[test]
fn test_set_then_get() {
    let store = TempDir::new().unwrap();

    ms(&store).args(["set", "recovery", "yes"]).assert().success();
    ms(&store)
        .args(["get", "recovery"])
        .assert()
        .success()
        .stdout(predicate::str::contains("yes"));
}

#[test]
fn test_get_missing_fails() {
    let store = TempDir::new().unwrap();

    ms(&store)
        .args(["get", "absent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No marker"));
}

#[test]
fn test_clear_and_list() {
    let store = TempDir::new().unwrap();

    ms(&store).args(["set", "a", "1"]).assert().success();
    ms(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("a = 1"));

    ms(&store).args(["clear", "a"]).assert().success();
    ms(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No markers found"));
}
