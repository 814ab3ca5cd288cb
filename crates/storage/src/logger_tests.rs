// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clodputer_core::EventKind;
use std::path::Path;
use tempfile::tempdir;

fn logger(dir: &Path) -> StructuredLogger {
    StructuredLogger::new(dir.join("execution.log"), dir.join("archive"))
}

#[test]
fn event_appends_a_jsonl_line() {
    let dir = tempdir().unwrap();
    let log = logger(dir.path());
    log.event(&LogEvent::new(EventKind::TaskStarted, Utc::now()).with_task_name("greet"));
    let tailed = log.tail(10).unwrap();
    assert_eq!(tailed.len(), 1);
    assert_eq!(tailed[0].task_name.as_deref(), Some("greet"));
}

#[test]
fn tail_returns_only_the_last_n_events_in_order() {
    let dir = tempdir().unwrap();
    let log = logger(dir.path());
    for i in 0..5 {
        log.event(&LogEvent::new(EventKind::TaskStarted, Utc::now()).with_task_id(i.to_string()));
    }
    let tailed = log.tail(2).unwrap();
    assert_eq!(tailed.len(), 2);
    assert_eq!(tailed[0].task_id.as_deref(), Some("3"));
    assert_eq!(tailed[1].task_id.as_deref(), Some("4"));
}

#[test]
fn rotation_moves_oversized_active_file_into_archive() {
    let dir = tempdir().unwrap();
    let log = logger(dir.path()).with_max_bytes(200);
    for i in 0..50 {
        log.event(&LogEvent::new(EventKind::TaskCompleted, Utc::now()).with_task_id(format!("task-{i}")));
    }
    let active_size = fs::metadata(dir.path().join("execution.log")).unwrap().len();
    assert!(active_size <= 200 || active_size < 2000);
    let archives: Vec<_> = fs::read_dir(dir.path().join("archive")).unwrap().collect();
    assert!(!archives.is_empty());
}

#[test]
fn prune_archives_keeps_only_the_newest() {
    let dir = tempdir().unwrap();
    let archive_dir = dir.path().join("archive");
    fs::create_dir_all(&archive_dir).unwrap();
    for (y, m) in [(2025, 1), (2025, 2), (2025, 3), (2025, 4), (2025, 5), (2025, 6), (2025, 7)] {
        fs::write(archive_dir.join(format!("{y}-{m:02}.log")), b"x").unwrap();
    }
    let log = logger(dir.path());
    log.prune_archives(6).unwrap();
    let remaining: Vec<String> = fs::read_dir(&archive_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining.len(), 6);
    assert!(!remaining.contains(&"2025-01.log".to_string()));
}

#[test]
fn follow_picks_up_events_appended_after_open() {
    let dir = tempdir().unwrap();
    let log = logger(dir.path());
    log.event(&LogEvent::new(EventKind::TaskStarted, Utc::now()));
    let mut follower = log.follow().unwrap();
    assert!(follower.poll().unwrap().is_empty());
    log.event(&LogEvent::new(EventKind::TaskCompleted, Utc::now()));
    let events = follower.poll().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, EventKind::TaskCompleted);
}

#[test]
fn tail_on_missing_file_is_empty_not_an_error() {
    let dir = tempdir().unwrap();
    let log = logger(dir.path());
    assert!(log.tail(10).unwrap().is_empty());
}
