//! Integration tests for the CLI interface
//!
//! Tests the main entry point and command parsing logic

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn shardcore() -> Command {
    let mut cmd = Command::cargo_bin("shardcore").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("SHARDCORE_REGISTRY_TYPE")
        .env_remove("SHARDCORE_REGISTRY_NAMESPACE")
        .env_remove("SHARDCORE_INSTANCE_ID")
        .env_remove("SHARDCORE_LOG_LEVEL");
    cmd
}

#[test]
fn test_cli_help_flag() {
    shardcore()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("check-config"))
        .stdout(predicate::str::contains("start"));
}

#[test]
fn test_invalid_command() {
    shardcore()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_check_config_prints_resolved_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "node.yaml",
        r#"
mode:
  repository:
    type: memory
    namespace: cli-check
instance:
  id: node-a
  labels: [oltp]
databases:
  - name: sharding_db
    rules:
      - type: broadcast
        tables: [t_dict]
"#,
    );

    shardcore()
        .arg("check-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("id: node-a"))
        .stdout(predicate::str::contains("namespace: cli-check"))
        .stdout(predicate::str::contains("max_worker_id: 1023"))
        .stdout(predicate::str::contains("sharding_db"));
}

#[test]
fn test_check_config_applies_environment_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "node.toml", "[instance]\nid = \"from-file\"\n");

    shardcore()
        .env("SHARDCORE_INSTANCE_ID", "from-env")
        .arg("check-config")
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("id: from-env"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "node.yaml",
        "log:\n  level: loud\nexecutor:\n  max_concurrency: 0\n",
    );

    shardcore()
        .arg("check-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("log.level"))
        .stderr(predicate::str::contains("executor.max_concurrency"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();

    shardcore()
        .arg("check-config")
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("absent.yaml"));
}

#[test]
fn test_unsupported_config_format_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "node.ini", "[instance]\n");

    shardcore()
        .arg("check-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration problem"));
}

#[test]
fn test_start_without_repository_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "node.yaml", "instance:\n  id: lonely\n");

    shardcore()
        .arg("start")
        .arg("--config")
        .arg(&path)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("repository"));
}
