// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios from the concrete scenario table (S1, S2, S4, S5,
//! S6): drives the built `clodputer` binary against an isolated
//! `CLODPUTER_HOME` with a stub LLM CLI standing in for the real one.

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn clodputer(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clodputer").unwrap();
    cmd.env("CLODPUTER_HOME", home);
    cmd
}

fn write_stub_cli(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("stub-cli.sh");
    fs::write(&path, script).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn write_task(home: &Path, name: &str, extra: &str) {
    let tasks_dir = home.join("tasks");
    fs::create_dir_all(&tasks_dir).unwrap();
    fs::write(
        tasks_dir.join(format!("{name}.yaml")),
        format!("name: {name}\ntrigger: {{type: manual}}\ntask:\n  prompt: \"go\"\n{extra}"),
    )
    .unwrap();
}

fn execution_log_lines(home: &Path) -> Vec<serde_json::Value> {
    let content = fs::read_to_string(home.join("execution.log")).unwrap_or_default();
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn count_events(events: &[serde_json::Value], kind: &str) -> usize {
    events
        .iter()
        .filter(|e| e.get("event").and_then(|v| v.as_str()) == Some(kind))
        .count()
}

/// S1 — happy single task.
#[test]
#[serial_test::serial(cli_path_env)]
fn s1_happy_single_task() {
    let home = TempDir::new().unwrap();
    let cli = write_stub_cli(home.path(), "#!/bin/sh\necho '{\"status\":\"ok\"}'\nexit 0\n");
    write_task(home.path(), "greet", "  timeout_seconds: 30\n");

    clodputer(home.path())
        .env("CLODPUTER_CLI_PATH", &cli)
        .arg("run")
        .arg("greet")
        .assert()
        .success();

    let events = execution_log_lines(home.path());
    assert_eq!(count_events(&events, "task_started"), 1);
    assert_eq!(count_events(&events, "task_completed"), 1);

    let metrics: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("metrics.json")).unwrap())
            .unwrap();
    assert_eq!(metrics["greet"]["success_count"], 1);
    assert_eq!(metrics["greet"]["failure_count"], 0);

    let snapshot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("queue.json")).unwrap())
            .unwrap();
    assert!(snapshot["running"].is_null());
    assert_eq!(snapshot["queued"].as_array().unwrap().len(), 0);
}

/// S2 — timeout then retry, then terminal failure.
#[test]
#[serial_test::serial(cli_path_env)]
fn s2_timeout_then_retry_then_terminal_failure() {
    let home = TempDir::new().unwrap();
    let cli = write_stub_cli(home.path(), "#!/bin/sh\nsleep 10\n");
    // initial_delay_seconds: 0 so the retried attempt is eligible the
    // moment `run_until_idle`'s next iteration peeks the queue, letting a
    // single `run` invocation observe both attempts.
    write_task(
        home.path(),
        "slow",
        "  timeout_seconds: 1\nretry:\n  enabled: true\n  max_attempts: 2\n  backoff: fixed\n  initial_delay_seconds: 0\n",
    );

    clodputer(home.path())
        .env("CLODPUTER_CLI_PATH", &cli)
        .arg("run")
        .arg("slow")
        .assert()
        .failure();

    let events = execution_log_lines(home.path());
    assert_eq!(count_events(&events, "task_timeout"), 2);
    assert_eq!(count_events(&events, "retry_scheduled"), 1);

    let metrics: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("metrics.json")).unwrap())
            .unwrap();
    assert_eq!(metrics["slow"]["failure_count"], 1);

    let snapshot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("queue.json")).unwrap())
            .unwrap();
    assert!(snapshot["running"].is_null());
    assert_eq!(snapshot["queued"].as_array().unwrap().len(), 0);
}

/// S4 — queue corruption recovery.
#[test]
#[serial_test::serial(cli_path_env)]
fn s4_queue_corruption_recovery() {
    let home = TempDir::new().unwrap();
    let cli = write_stub_cli(home.path(), "#!/bin/sh\necho '{\"status\":\"ok\"}'\nexit 0\n");
    write_task(home.path(), "greet", "  timeout_seconds: 30\n");
    fs::write(home.path().join("queue.json"), "not json").unwrap();

    clodputer(home.path())
        .env("CLODPUTER_CLI_PATH", &cli)
        .arg("run")
        .arg("greet")
        .assert()
        .success();

    let recovered: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(home.path().join("queue.json")).unwrap())
            .unwrap();
    assert!(recovered["running"].is_null());
    assert_eq!(recovered["queued"].as_array().unwrap().len(), 0);

    let quarantined: Vec<_> = fs::read_dir(home.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("queue.corrupt-")
        })
        .collect();
    assert_eq!(quarantined.len(), 1);

    let events = execution_log_lines(home.path());
    assert_eq!(count_events(&events, "queue_recovered_from_corruption"), 1);
}

/// S5 — lock contention: a live PID already holds the lock, so a second
/// executor refuses to start, exits non-zero, and names the holder.
#[test]
fn s5_lock_contention() {
    let home = TempDir::new().unwrap();
    fs::create_dir_all(home.path()).unwrap();
    fs::write(home.path().join("clodputer.lock"), std::process::id().to_string()).unwrap();

    let started = std::time::Instant::now();
    let output = clodputer(home.path())
        .arg("run")
        .arg("whatever")
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).into_owned();
    assert!(stderr.contains(&std::process::id().to_string()));
    assert!(started.elapsed() < Duration::from_secs(5));

    // The lockfile must be untouched — B never deleted or overwrote it.
    let contents = fs::read_to_string(home.path().join("clodputer.lock")).unwrap();
    assert_eq!(contents, std::process::id().to_string());
}

/// S6 — watcher debounce: a burst within `debounce_ms` collapses to one
/// enqueue; events spaced further apart than `debounce_ms` each enqueue.
#[test]
fn s6_watcher_debounce_collapses_bursts() {
    use clodputer_adapters::watcher::Debouncer;

    let mut debouncer = Debouncer::new();
    let path = PathBuf::from("/tmp/a.md");
    let now = chrono::Utc::now();

    // Four events within 100ms of each other, debounce_ms = 500: only the
    // first should be accepted.
    let mut accepted = 0;
    for offset_ms in [0, 20, 50, 90] {
        let t = now + chrono::Duration::milliseconds(offset_ms);
        if debouncer.accept("a-task", &path, 500, t) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);

    // A further event after the debounce window elapses must be accepted.
    let later = now + chrono::Duration::milliseconds(700);
    assert!(debouncer.accept("a-task", &path, 500, later));
}
