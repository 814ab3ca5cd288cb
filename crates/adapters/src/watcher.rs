// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watch registrations and the debounce table that coalesces
//! bursts of events into a single enqueue (§4.8).
//!
//! Debounce decision logic is kept pure and clock-injectable so it can be
//! tested without relying on real filesystem event timing; the `notify`
//! plumbing around it is a thin, mostly-untested wiring layer, keeping the
//! deterministic decision logic separate from the I/O event source.

use chrono::{DateTime, Utc};
use clodputer_core::task::WatchEvent;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// A single `file_watch` task registration.
#[derive(Debug, Clone)]
pub struct WatchRegistration {
    pub task_name: String,
    pub path: PathBuf,
    pub pattern: String,
    pub event: WatchEvent,
    pub debounce_ms: u64,
}

/// A debounced, accepted watch event ready to enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredRun {
    pub task_name: String,
    pub path: PathBuf,
    pub event: WatchEvent,
    pub timestamp: DateTime<Utc>,
}

/// Coalesces repeated events on the same `(task, path)` within the task's
/// `debounce_ms`, keeping only the last one in each accepted window.
#[derive(Default)]
pub struct Debouncer {
    last_accepted: HashMap<(String, PathBuf), DateTime<Utc>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this event should be forwarded. Always accepts
    /// the first event for a key; subsequent events within `debounce_ms`
    /// of the last *accepted* one are swallowed.
    pub fn accept(
        &mut self,
        task_name: &str,
        path: &Path,
        debounce_ms: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let key = (task_name.to_string(), path.to_path_buf());
        let accept = match self.last_accepted.get(&key) {
            Some(last) => (now - *last).num_milliseconds() >= debounce_ms as i64,
            None => true,
        };
        if accept {
            self.last_accepted.insert(key, now);
        }
        accept
    }
}

/// Does `basename` match the task's glob `pattern`?
pub fn matches_pattern(basename: &str, pattern: &str) -> Result<bool, WatcherError> {
    let compiled = glob::Pattern::new(pattern).map_err(|source| WatcherError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(compiled.matches(basename))
}

/// Map a raw `notify` event kind to one of the three watch events the task
/// model supports.
pub fn classify_event(kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind::*;
    match kind {
        Create(_) => Some(WatchEvent::Created),
        Modify(_) => Some(WatchEvent::Modified),
        Remove(_) => Some(WatchEvent::Deleted),
        _ => None,
    }
}

/// A live set of filesystem observers feeding a single debounced channel
/// of accepted runs.
pub struct FsWatcher {
    _watchers: Vec<RecommendedWatcher>,
    rx: std_mpsc::Receiver<TriggeredRun>,
}

impl FsWatcher {
    /// Start observing every registration. Each registration gets its own
    /// `notify` watcher rooted at its parent directory (so a `Created`
    /// event on the watched path itself is observable), filtered by glob
    /// pattern and event kind, then debounced into a shared channel.
    pub fn start(registrations: Vec<WatchRegistration>) -> Result<Self, WatcherError> {
        let (tx, rx) = std_mpsc::channel::<TriggeredRun>();
        let mut watchers = Vec::new();
        let debouncer = std::sync::Arc::new(std::sync::Mutex::new(Debouncer::new()));

        for reg in registrations {
            let watch_root = if reg.path.is_dir() {
                reg.path.clone()
            } else {
                reg.path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            };

            let tx = tx.clone();
            let debouncer = debouncer.clone();
            let task_name = reg.task_name.clone();
            let pattern = reg.pattern.clone();
            let wanted_event = reg.event;
            let debounce_ms = reg.debounce_ms;

            let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, task = %task_name, "watch error");
                        return;
                    }
                };
                let Some(kind) = classify_event(&event.kind) else {
                    return;
                };
                if kind != wanted_event {
                    return;
                }
                for path in &event.paths {
                    let basename = path.file_name().map(|n| n.to_string_lossy().into_owned());
                    let Some(basename) = basename else { continue };
                    match matches_pattern(&basename, &pattern) {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(e) => {
                            warn!(error = %e, "glob match failed");
                            continue;
                        }
                    }
                    let now = Utc::now();
                    let mut guard = match debouncer.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    if guard.accept(&task_name, path, debounce_ms, now) {
                        let _ = tx.send(TriggeredRun {
                            task_name: task_name.clone(),
                            path: path.clone(),
                            event: kind,
                            timestamp: now,
                        });
                    }
                }
            })?;
            watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
            watchers.push(watcher);
        }

        Ok(Self {
            _watchers: watchers,
            rx,
        })
    }

    /// Block until the next accepted run, or return `None` if every
    /// watcher has been dropped.
    pub fn recv(&self) -> Option<TriggeredRun> {
        self.rx.recv().ok()
    }

    /// Non-blocking poll for a currently available accepted run.
    pub fn try_recv(&self) -> Option<TriggeredRun> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
