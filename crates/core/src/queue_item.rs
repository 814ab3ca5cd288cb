// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue item and queue-state document shapes (§3, §6 queue document schema).
//!
//! This module is pure data — ordering, persistence, and lockfile behavior
//! live in `clodputer-storage`; this crate only defines what a queue item
//! and the overall queue document look like.

use crate::id::QueueItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task priority. `High` strictly precedes `Normal` in dequeue order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub name: String,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
    pub not_before: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(name: impl Into<String>, priority: Priority, now: DateTime<Utc>) -> Self {
        Self {
            id: QueueItemId::new(),
            name: name.into(),
            priority,
            enqueued_at: now,
            attempt_count: 0,
            not_before: now,
            metadata: HashMap::new(),
            pid: None,
            started_at: None,
        }
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now
    }
}

/// The full queue document persisted to `queue.json` (§6 schema).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueState {
    pub running: Option<QueueItem>,
    pub queued: Vec<QueueItem>,
}

impl QueueState {
    pub fn is_empty(&self) -> bool {
        self.running.is_none() && self.queued.is_empty()
    }
}
