// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured log event shapes (§3, §4.2, §6 log line schema).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every lifecycle event the runtime can emit. Non-exhaustive in the
/// original spec's words — new variants are additive and never change the
/// meaning of an existing one, since log files are append-only and must
/// remain parseable forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskEnqueued,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskTimeout,
    TaskConfigError,
    TaskDisabledSkipped,
    TaskDeferred,
    CleanupKilled,
    CleanupOrphanSwept,
    QueueRecoveredFromCorruption,
    LockAcquired,
    LockReleased,
    LockStaleRemoved,
    WatcherTriggered,
    WatcherDebounced,
    CronInstalled,
    CronUninstalled,
    RetryScheduled,
}

/// A single JSON-lined event as persisted in `execution.log` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(event: EventKind, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            event,
            task_name: None,
            task_id: None,
            duration_seconds: None,
            return_code: None,
            status: None,
            error: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_task_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_return_code(mut self, code: i32) -> Self {
        self.return_code = Some(code);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.extra.insert(key.into(), v);
        }
        self
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let event = LogEvent::new(EventKind::TaskStarted, Utc::now())
            .with_task_name("greet")
            .with_task_id("abc-123");
        let line = event.to_jsonl().unwrap();
        let parsed: LogEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.event, EventKind::TaskStarted);
        assert_eq!(parsed.task_name.as_deref(), Some("greet"));
    }

    #[test]
    fn extra_fields_are_flattened_not_nested() {
        let event = LogEvent::new(EventKind::WatcherTriggered, Utc::now())
            .with_extra("path", "/tmp/a.md");
        let line = event.to_jsonl().unwrap();
        assert!(line.contains("\"path\":\"/tmp/a.md\""));
        assert!(!line.contains("\"extra\""));
    }
}
