// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted per-task metrics (§3, §4.3).

use chrono::{DateTime, Utc};
use clodputer_core::MetricsRecord;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use thiserror::Error;

use crate::atomic::write_json_atomic;

#[derive(Debug, Error)]
pub enum MetricsStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One atomic document holding a [`MetricsRecord`] per task name.
pub struct MetricsStore {
    path: PathBuf,
    records: Mutex<HashMap<String, MetricsRecord>>,
}

impl MetricsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MetricsStoreError> {
        let path = path.into();
        let records = if path.exists() {
            let file = File::open(&path)?;
            serde_json::from_reader(BufReader::new(file)).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Fold in the outcome of one run and persist.
    pub fn record_outcome(
        &self,
        name: &str,
        status: &str,
        duration_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<MetricsRecord, MetricsStoreError> {
        let mut records = self.records.lock();
        let record = records.entry(name.to_string()).or_default();
        record.record_outcome(status, duration_seconds, now);
        let snapshot = record.clone();
        write_json_atomic(&self.path, &*records)?;
        Ok(snapshot)
    }

    pub fn get(&self, name: &str) -> Option<MetricsRecord> {
        self.records.lock().get(name).cloned()
    }

    pub fn all(&self) -> HashMap<String, MetricsRecord> {
        self.records.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_outcome_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        {
            let store = MetricsStore::open(&path).unwrap();
            store.record_outcome("greet", "success", 1.5, Utc::now()).unwrap();
        }
        let reopened = MetricsStore::open(&path).unwrap();
        let record = reopened.get("greet").unwrap();
        assert_eq!(record.success_count, 1);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = MetricsStore::open(dir.path().join("metrics.json")).unwrap();
        assert!(store.all().is_empty());
    }

    #[test]
    fn distinct_task_names_are_tracked_independently() {
        let dir = tempdir().unwrap();
        let store = MetricsStore::open(dir.path().join("metrics.json")).unwrap();
        store.record_outcome("a", "success", 1.0, Utc::now()).unwrap();
        store.record_outcome("b", "failure", 2.0, Utc::now()).unwrap();
        assert_eq!(store.get("a").unwrap().success_count, 1);
        assert_eq!(store.get("b").unwrap().failure_count, 1);
    }
}
