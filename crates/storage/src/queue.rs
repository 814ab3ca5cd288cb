// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted task queue (§3, §4.4).
//!
//! Ordering, `not_before` honoring, and the retry-on-failure decision all
//! live here; callers only supply the already-classified `retryable` bit
//! and a [`RetryPolicy`] — this module never guesses at retry semantics
//! from an error value.

use chrono::{DateTime, Utc};
use clodputer_core::{compute_backoff, Priority, QueueItem, QueueItemId, QueueState, RetryPolicy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::atomic::write_json_atomic;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no item with id {0} is running")]
    NotRunning(QueueItemId),
    #[error("item {0} is already running")]
    AlreadyRunning(QueueItemId),
    #[error("no queued item with id {0}")]
    NotFound(QueueItemId),
}

/// Outcome of [`Queue::fail`]: whether the item was re-enqueued or is done.
#[derive(Debug, Clone, PartialEq)]
pub enum FailOutcome {
    /// Exhausted retries, or not retryable: the item is gone for good.
    Terminal,
    /// Re-enqueued with an incremented attempt count.
    Retried {
        attempt_count: u32,
        not_before: DateTime<Utc>,
    },
}

/// The crash-safe, priority-aware task queue.
///
/// A single in-process mutex is sufficient around the in-memory state
/// because exactly one executor process ever holds the on-disk lock
/// (§5 mutual exclusion) and mutates this queue.
pub struct Queue {
    path: PathBuf,
    state: Mutex<QueueState>,
    recovered_from_corruption: bool,
}

impl Queue {
    /// Load the queue document at `path`, recovering from corruption by
    /// quarantining the unreadable file and starting from an empty queue.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();
        let (state, recovered_from_corruption) = load_or_recover(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
            recovered_from_corruption,
        })
    }

    /// Whether `open` quarantined an unparseable document and started fresh
    /// (§3 invariant 5 / scenario S4). Callers with a logger handle should
    /// emit a recovery event when this is `true`.
    pub fn recovered_from_corruption(&self) -> bool {
        self.recovered_from_corruption
    }

    fn persist(&self, state: &QueueState) -> Result<(), QueueError> {
        write_json_atomic(&self.path, state)?;
        Ok(())
    }

    /// Add a new item to the back of its priority class.
    pub fn enqueue(
        &self,
        name: impl Into<String>,
        priority: Priority,
        metadata: HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItemId, QueueError> {
        let mut state = self.state.lock();
        let mut item = QueueItem::new(name, priority, now);
        item.metadata = metadata;
        let id = item.id;
        state.queued.push(item);
        self.persist(&state)?;
        Ok(id)
    }

    /// The next eligible item per ordering and `not_before`, without
    /// mutating the queue. High priority strictly precedes normal; within
    /// a class, FIFO by `enqueued_at`.
    pub fn peek(&self, now: DateTime<Utc>) -> Option<QueueItem> {
        let state = self.state.lock();
        eligible_in_order(&state.queued, now).next().cloned()
    }

    /// Move `item` from `queued` to `running`, stamping `started_at` and
    /// `pid`.
    pub fn promote_running(
        &self,
        id: QueueItemId,
        pid: u32,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        let mut state = self.state.lock();
        if state.running.is_some() {
            return Err(QueueError::AlreadyRunning(id));
        }
        let position = state
            .queued
            .iter()
            .position(|item| item.id == id)
            .ok_or(QueueError::NotFound(id))?;
        let mut item = state.queued.remove(position);
        item.pid = Some(pid);
        item.started_at = Some(now);
        state.running = Some(item.clone());
        self.persist(&state)?;
        Ok(item)
    }

    /// Remove the running item on successful completion.
    pub fn complete(&self, id: QueueItemId) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        match &state.running {
            Some(item) if item.id == id => {
                state.running = None;
                self.persist(&state)
            }
            Some(_) | None => Err(QueueError::NotRunning(id)),
        }
    }

    /// Remove the running item on failure, re-enqueueing it if the retry
    /// policy allows another attempt.
    pub fn fail(
        &self,
        id: QueueItemId,
        retryable: bool,
        retry: &RetryPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailOutcome, QueueError> {
        let mut state = self.state.lock();
        let running = match state.running.take() {
            Some(item) if item.id == id => item,
            Some(other) => {
                state.running = Some(other);
                return Err(QueueError::NotRunning(id));
            }
            None => return Err(QueueError::NotRunning(id)),
        };

        let outcome = if retryable && retry.enabled && running.attempt_count < retry.max_attempts {
            let attempt_count = running.attempt_count + 1;
            let delay = compute_backoff(retry.backoff, attempt_count, retry.initial_delay(), retry.max_delay());
            let not_before = now
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            let mut retried = running;
            retried.attempt_count = attempt_count;
            retried.not_before = not_before;
            retried.pid = None;
            retried.started_at = None;
            state.queued.push(retried);
            FailOutcome::Retried {
                attempt_count,
                not_before,
            }
        } else {
            FailOutcome::Terminal
        };

        self.persist(&state)?;
        Ok(outcome)
    }

    /// Push a still-queued item's `not_before` out without touching its
    /// `attempt_count` — used by the executor's resource gate, which defers
    /// execution rather than consuming a retry attempt.
    pub fn defer(
        &self,
        id: QueueItemId,
        delay: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, QueueError> {
        let mut state = self.state.lock();
        let not_before =
            now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let item = state
            .queued
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(QueueError::NotFound(id))?;
        item.not_before = not_before;
        self.persist(&state)?;
        Ok(not_before)
    }

    /// Drop every queued item (never the running one).
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut state = self.state.lock();
        let removed = state.queued.len();
        state.queued.clear();
        self.persist(&state)?;
        Ok(removed)
    }

    /// A consistent read-only copy of the whole queue document.
    pub fn snapshot(&self) -> QueueState {
        self.state.lock().clone()
    }
}

/// Items eligible to run (`not_before <= now`), in dequeue order.
fn eligible_in_order(
    queued: &[QueueItem],
    now: DateTime<Utc>,
) -> impl Iterator<Item = &QueueItem> {
    let mut ordered: Vec<&QueueItem> = queued.iter().filter(|item| item.is_eligible(now)).collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.enqueued_at.cmp(&b.enqueued_at))
    });
    ordered.into_iter()
}

fn load_or_recover(path: &Path) -> Result<(QueueState, bool), QueueError> {
    if !path.exists() {
        return Ok((QueueState::default(), false));
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(state) => Ok((state, false)),
        Err(e) => {
            let quarantine = quarantine_path(path, Utc::now());
            warn!(
                error = %e,
                path = %path.display(),
                quarantine = %quarantine.display(),
                "queue document unparseable, quarantining and starting fresh",
            );
            fs::rename(path, &quarantine)?;
            Ok((QueueState::default(), true))
        }
    }
}

fn quarantine_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "queue".to_string());
    path.with_file_name(format!("{stem}.corrupt-{}.json", now.format("%Y%m%dT%H%M%SZ")))
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
