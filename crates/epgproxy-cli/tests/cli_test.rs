#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

#[test]
fn test_help_lists_subcommands() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("channels"))
        .stdout(predicate::str::contains("normalize"));
}

#[test]
fn test_query_help() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.args(["query", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--channel"))
        .stdout(predicate::str::contains("--date"));
}

#[test]
fn test_query_missing_channel() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--channel"));
}

#[test]
fn test_query_invalid_date() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["query", "--channel", "CCTV1", "--date", "2024/01/24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
}

#[test]
fn test_query_without_primary_source() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["query", "--channel", "CCTV1", "--date", "2024-01-24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no primary source configured"));
}

#[test]
fn test_normalize_builtin_alias() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["normalize", "cctv-5+"])
        .assert()
        .success()
        .stdout("CCTV5+\n");
}

#[test]
fn test_normalize_user_alias_file() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[aliases]\npath = \"aliases.toml\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("aliases.toml"),
        "[[channel]]\nkey = \"LOCAL1\"\naliases = [\"My Town TV\"]\n",
    )
    .unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["normalize", "my town tv HD"])
        .assert()
        .success()
        .stdout("LOCAL1\n");
}

#[test]
fn test_invalid_cache_config_is_rejected() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[source]\nprimary = \"http://127.0.0.1:9/e.xml\"\n\n[cache]\nttl_secs = 0\n",
    )
    .unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgproxy");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["query", "--channel", "CCTV1", "--date", "2024-01-24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid [cache] settings"));
}
