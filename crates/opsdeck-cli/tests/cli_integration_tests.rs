//! CLI integration tests
//!
//! Network-free paths only: help, backends, config management and the
//! login guard. Each test points the binary at its own config directory.

use assert_cmd::Command;
use predicates::prelude::*;

fn opsdeck(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("opsdeck").unwrap();
    cmd.env("OPSDECK_CONFIG_DIR", config_dir);
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("redeploy"))
        .stdout(predicate::str::contains("backends"));
}

#[test]
fn backends_marks_the_active_deployment() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("* Apt"))
        .stdout(predicate::str::contains("https://api.atoms.trade"))
        .stdout(predicate::str::contains("Tradebulls"));
}

#[test]
fn config_set_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .args(["config", "set", "backend.base_url", "https://smc.api.atoms.trade"])
        .assert()
        .success();

    opsdeck(dir.path())
        .args(["config", "get", "backend.base_url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://smc.api.atoms.trade"));
}

#[test]
fn config_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .args(["config", "get", "no.such.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn backend_flag_persists_the_chosen_deployment() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .args(["--backend", "https://tradesmart.api.atoms.trade/", "backends"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* Tradesmart"));

    opsdeck(dir.path())
        .args(["config", "get", "backend.base_url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://tradesmart.api.atoms.trade"));
}

#[test]
fn status_requires_login() {
    let dir = tempfile::tempdir().unwrap();
    opsdeck(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
