//! End-to-end tests of the runtask binary

use crate::common::jar;
use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary with config and cache isolated under `temp`
fn runtask(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("runtask");
    cmd.env("RUNTASK_CONFIG", temp.path().join("config.toml"))
        .env("RUNTASK_CACHE_DIR", temp.path().join("cache"))
        .env_remove("RUNTASK_OFFLINE")
        .env_remove("RUNTASK_REFRESH")
        .env_remove("RUNTASK_RECHECK_INTERVAL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_displays() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch and cache server jars"));
}

#[test]
fn version_displays() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("runtask"));
}

#[test]
fn config_path_uses_env() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_show_prints_sections() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("1h")));
}

#[test]
fn config_init_writes_file() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration initialized"));
    assert!(temp.path().join("config.toml").exists());

    runtask(&temp)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "[cache\n").unwrap();
    runtask(&temp)
        .args(["cache", "path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn invalid_recheck_interval_is_rejected() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["--recheck-interval", "hourly", "cache", "path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'hourly'").and(predicate::str::contains("Hint:")));
}

#[test]
fn non_ascii_recheck_interval_is_rejected() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["--recheck-interval", "5µ", "cache", "path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'5µ'").and(predicate::str::contains("Hint:")))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn cache_path_honours_flag() {
    let temp = TempDir::new().unwrap();
    let other = temp.path().join("elsewhere");
    runtask(&temp)
        .args(["--cache-dir", other.to_str().unwrap(), "cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));
}

#[test]
fn cache_list_empty() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached artifacts"));

    runtask(&temp)
        .args(["cache", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn offline_resolve_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["--offline", "resolve", "channel", "paper", "1.20.1", "42"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("Offline mode")
                .and(predicate::str::contains("42"))
                .and(predicate::str::contains("Hint:")),
        );
}

#[test]
fn resolve_rejects_bad_reference() {
    let temp = TempDir::new().unwrap();
    runtask(&temp)
        .args(["resolve", "url", "ftp://example.com/a.jar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid artifact reference"));
}

#[test]
fn resolve_url_prints_path_then_clear() {
    let temp = TempDir::new().unwrap();
    let mut server = mockito::Server::new();
    let download = server
        .mock("GET", "/plugins/Thing.jar")
        .with_status(200)
        .with_body(jar("Thing"))
        .expect(1)
        .create();
    let url = format!("{}/plugins/Thing.jar", server.url());

    runtask(&temp)
        .args(["resolve", "url", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Thing.jar"));

    runtask(&temp)
        .args(["--offline", "resolve", "--json", "url", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"provider\": \"url\""));
    download.assert();

    runtask(&temp)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Thing.jar").and(predicate::str::contains("Total: 1")));

    // Without a terminal the prompt defaults to no
    runtask(&temp)
        .args(["cache", "clear", "url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted"));
    assert!(temp.path().join("cache").join("url").exists());

    runtask(&temp)
        .args(["cache", "clear", "url", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
    assert!(!temp.path().join("cache").join("url").exists());
}
