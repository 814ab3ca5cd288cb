// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration as StdDuration;
use tempfile::tempdir;

#[test]
fn first_event_for_a_key_is_always_accepted() {
    let mut debouncer = Debouncer::new();
    let now = Utc::now();
    assert!(debouncer.accept("greet", Path::new("/tmp/a.md"), 500, now));
}

#[test]
fn event_within_debounce_window_is_swallowed() {
    let mut debouncer = Debouncer::new();
    let now = Utc::now();
    assert!(debouncer.accept("greet", Path::new("/tmp/a.md"), 500, now));
    let soon = now + chrono::Duration::milliseconds(100);
    assert!(!debouncer.accept("greet", Path::new("/tmp/a.md"), 500, soon));
}

#[test]
fn event_after_debounce_window_is_accepted() {
    let mut debouncer = Debouncer::new();
    let now = Utc::now();
    assert!(debouncer.accept("greet", Path::new("/tmp/a.md"), 500, now));
    let later = now + chrono::Duration::milliseconds(600);
    assert!(debouncer.accept("greet", Path::new("/tmp/a.md"), 500, later));
}

#[test]
fn different_tasks_debounce_independently() {
    let mut debouncer = Debouncer::new();
    let now = Utc::now();
    assert!(debouncer.accept("a", Path::new("/tmp/x.md"), 500, now));
    assert!(debouncer.accept("b", Path::new("/tmp/x.md"), 500, now));
}

#[test]
fn different_paths_debounce_independently() {
    let mut debouncer = Debouncer::new();
    let now = Utc::now();
    assert!(debouncer.accept("a", Path::new("/tmp/x.md"), 500, now));
    assert!(debouncer.accept("a", Path::new("/tmp/y.md"), 500, now));
}

#[test]
fn glob_pattern_matches_basenames() {
    assert!(matches_pattern("notes.md", "*.md").unwrap());
    assert!(!matches_pattern("notes.txt", "*.md").unwrap());
}

#[test]
fn invalid_glob_pattern_errors() {
    assert!(matches_pattern("x", "[").is_err());
}

#[test]
fn classify_event_maps_create_modify_remove() {
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::EventKind;
    assert_eq!(
        classify_event(&EventKind::Create(CreateKind::File)),
        Some(WatchEvent::Created)
    );
    assert_eq!(
        classify_event(&EventKind::Modify(ModifyKind::Any)),
        Some(WatchEvent::Modified)
    );
    assert_eq!(
        classify_event(&EventKind::Remove(RemoveKind::File)),
        Some(WatchEvent::Deleted)
    );
    assert_eq!(classify_event(&EventKind::Access(notify::event::AccessKind::Any)), None);
}

#[test]
fn fs_watcher_reports_a_matching_file_creation() {
    let dir = tempdir().unwrap();
    let watcher = FsWatcher::start(vec![WatchRegistration {
        task_name: "on-new-note".to_string(),
        path: dir.path().to_path_buf(),
        pattern: "*.md".to_string(),
        event: WatchEvent::Created,
        debounce_ms: 50,
    }])
    .unwrap();

    std::thread::sleep(StdDuration::from_millis(100));
    std::fs::write(dir.path().join("note.md"), b"hello").unwrap();

    let run = wait_for_run(&watcher, StdDuration::from_secs(3));
    let run = run.expect("expected a triggered run for note.md");
    assert_eq!(run.task_name, "on-new-note");
    assert_eq!(run.event, WatchEvent::Created);
}

#[test]
fn fs_watcher_ignores_non_matching_files() {
    let dir = tempdir().unwrap();
    let watcher = FsWatcher::start(vec![WatchRegistration {
        task_name: "on-new-note".to_string(),
        path: dir.path().to_path_buf(),
        pattern: "*.md".to_string(),
        event: WatchEvent::Created,
        debounce_ms: 50,
    }])
    .unwrap();

    std::thread::sleep(StdDuration::from_millis(100));
    std::fs::write(dir.path().join("note.txt"), b"hello").unwrap();

    assert!(wait_for_run(&watcher, StdDuration::from_millis(500)).is_none());
}

fn wait_for_run(watcher: &FsWatcher, timeout: StdDuration) -> Option<TriggeredRun> {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if let Some(run) = watcher.try_recv() {
            return Some(run);
        }
        std::thread::sleep(StdDuration::from_millis(20));
    }
    None
}
