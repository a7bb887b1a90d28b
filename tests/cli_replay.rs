//! CLI tests for `archive-progress`.
//!
//! Recorded task scripts are written to temporary directories and played
//! back through the binary.

#![allow(deprecated)] // cargo_bin deprecation

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const FULL_TASK: &str = r#"[
    [{"eventType": "scan-progress", "count": 3}],
    [{"eventType": "stored", "src": "/media/card/a.jpg", "dst": "/archive/a.jpg", "generated": false},
     {"eventType": "stored", "src": "/media/card/b.jpg", "dst": "/archive/b.jpg", "generated": true},
     {"eventType": "scan-complete", "count": 5}],
    [{"eventType": "skipped", "src": "/media/card/c.jpg", "existing": "/archive/c.jpg"},
     {"eventType": "errored", "src": "/media/card/d.jpg", "cause": "unreadable"},
     {"eventType": "completed"}]
]"#;

fn write_script(temp: &TempDir, content: &str) -> std::path::PathBuf {
    let script = temp.child("task.json");
    script.write_str(content).unwrap();
    script.path().to_path_buf()
}

#[test]
fn fold_prints_final_snapshot() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, FULL_TASK);

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("fold").arg(&script);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(r#""state": "completed""#))
        .stdout(predicate::str::contains(r#""total": 5"#))
        .stdout(predicate::str::contains(r#""Stored": 2"#))
        .stdout(predicate::str::contains(r#""Errors": 1"#));
}

#[test]
fn replay_json_prints_every_snapshot() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, FULL_TASK);

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("replay")
        .arg(&script)
        .args(["--interval-ms", "0", "--output", "json"]);

    let output = cmd.assert().success().get_output().stdout.clone();
    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let states: Vec<&str> = lines
        .iter()
        .map(|line| line["state"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["scanning", "scanning", "running", "completed"]);
    assert_eq!(lines[3]["metrics"]["Skipped"], 1);
}

#[test]
fn replay_pretty_prints_summary() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, FULL_TASK);

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("replay").arg(&script).args(["--interval-ms", "0"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Task completed"))
        .stdout(predicate::str::contains("Stored"))
        .stdout(predicate::str::contains("/ 5"));
}

#[test]
fn replay_without_completion_fails() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, r#"[[{"eventType": "scan-progress", "count": 2}]]"#);

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("replay")
        .arg(&script)
        .args(["--interval-ms", "0", "--output", "json"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("closed before the task completed"));
}

#[test]
fn replay_reads_interval_from_config() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, r#"[[{"eventType": "completed"}]]"#);
    let config = temp.child("config.toml");
    config
        .write_str("archive_dir = \"/tmp/archive\"\nevent_poll_interval_ms = 1\n")
        .unwrap();

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("replay")
        .arg(&script)
        .args(["--output", "json", "--config"])
        .arg(config.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn missing_config_is_created() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, r#"[[{"eventType": "completed"}]]"#);
    let config = temp.child("conf").child("config.toml");

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("replay")
        .arg(&script)
        .args(["--output", "json", "--config"])
        .arg(config.path());

    cmd.assert().success();
    config.assert(predicate::str::contains("event_poll_interval_ms"));
}

#[test]
fn invalid_script_is_reported() {
    let temp = TempDir::new().unwrap();
    let script = write_script(&temp, r#"[[{"eventType": "exploded"}]]"#);

    let mut cmd = Command::cargo_bin("archive-progress").unwrap();
    cmd.arg("fold").arg(&script);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read task script"));
}
