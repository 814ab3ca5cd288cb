// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The structured, append-only execution log (§4.2).
//!
//! A writer failure here must never crash the caller — every fallible step
//! is logged via `tracing` and swallowed rather than propagated, so a full
//! disk or a permissions error degrades observability instead of the task
//! run itself.

use chrono::Utc;
use clodputer_core::LogEvent;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::atomic::append_line;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ARCHIVES: usize = 6;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only JSONL execution log with size-based monthly rotation.
pub struct StructuredLogger {
    active_path: PathBuf,
    archive_dir: PathBuf,
    max_bytes: u64,
    max_archives: usize,
    rotation_lock: Mutex<()>,
}

impl StructuredLogger {
    pub fn new(active_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_path: active_path.into(),
            archive_dir: archive_dir.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            max_archives: DEFAULT_MAX_ARCHIVES,
            rotation_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Append one event, rotating first if the active file has grown past
    /// the size budget. Never returns an error to the caller; failures are
    /// logged and the event is dropped.
    pub fn event(&self, event: &LogEvent) {
        if let Err(e) = self.rotate_if_needed() {
            error!(error = %e, "log rotation failed");
        }
        match event.to_jsonl() {
            Ok(line) => {
                if let Err(e) = append_line(&self.active_path, &line) {
                    error!(error = %e, path = %self.active_path.display(), "failed to append log event");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize log event"),
        }
    }

    /// Rename/append the active file into its monthly archive when it
    /// exceeds the size budget, then start a fresh active file.
    pub fn rotate_if_needed(&self) -> Result<bool, LoggerError> {
        let _guard = self.rotation_lock.lock();
        let size = match fs::metadata(&self.active_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if size <= self.max_bytes {
            return Ok(false);
        }
        self.rotate_now()?;
        Ok(true)
    }

    fn rotate_now(&self) -> Result<(), LoggerError> {
        fs::create_dir_all(&self.archive_dir)?;
        let archive_path = self.archive_dir.join(format!("{}.log", Utc::now().format("%Y-%m")));

        if archive_path.exists() {
            let mut active_contents = Vec::new();
            File::open(&self.active_path)?.read_to_end(&mut active_contents)?;
            let mut archive_file = fs::OpenOptions::new().append(true).open(&archive_path)?;
            std::io::Write::write_all(&mut archive_file, &active_contents)?;
            archive_file.sync_all()?;
            fs::remove_file(&self.active_path)?;
        } else {
            fs::rename(&self.active_path, &archive_path)?;
        }

        // Touch the active file back into existence so subsequent appends
        // don't need to recreate the directory structure.
        File::create(&self.active_path)?.sync_all()?;
        self.prune_archives(self.max_archives)?;
        Ok(())
    }

    /// Keep only the `keep` most recent archives (by `YYYY-MM` filename
    /// ordering), deleting the rest.
    pub fn prune_archives(&self, keep: usize) -> Result<(), LoggerError> {
        let mut entries: Vec<PathBuf> = match fs::read_dir(&self.archive_dir) {
            Ok(dir) => dir
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map(|ext| ext == "log").unwrap_or(false))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        entries.sort();
        if entries.len() > keep {
            for stale in &entries[..entries.len() - keep] {
                if let Err(e) = fs::remove_file(stale) {
                    error!(error = %e, path = %stale.display(), "failed to prune archived log");
                }
            }
        }
        Ok(())
    }

    /// The last `n` events in the active file, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<LogEvent>, LoggerError> {
        let file = match File::open(&self.active_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        let mut lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        if lines.len() > n {
            lines.drain(..lines.len() - n);
        }
        Ok(lines
            .into_iter()
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect())
    }

    /// Start a follower positioned at the end of the active file.
    pub fn follow(&self) -> Result<LogFollower, LoggerError> {
        LogFollower::open(self.active_path.clone())
    }
}

/// A cursor over the active log that re-opens the file when rotation
/// replaces it out from under the reader (detected via a changed inode).
pub struct LogFollower {
    path: PathBuf,
    file: File,
    position: u64,
    ino: u64,
}

impl LogFollower {
    fn open(path: PathBuf) -> Result<Self, LoggerError> {
        let file = File::open(&path)?;
        let meta = file.metadata()?;
        let position = meta.len();
        Ok(Self {
            path,
            ino: meta.ino(),
            file,
            position,
        })
    }

    /// Return newly appended events since the last poll. Reopens the file
    /// transparently if it was rotated. Returns an empty vec when there is
    /// nothing new yet; callers loop with their own poll interval.
    pub fn poll(&mut self) -> Result<Vec<LogEvent>, LoggerError> {
        if let Ok(meta) = fs::metadata(&self.path) {
            if meta.ino() != self.ino {
                self.file = File::open(&self.path)?;
                self.ino = meta.ino();
                self.position = 0;
            }
        }

        self.file.seek(SeekFrom::Start(self.position))?;
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut self.file, &mut buf)?;
        self.position += buf.len() as u64;

        Ok(buf
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Poll interval callers should sleep between [`poll`] calls.
    pub fn poll_interval() -> Duration {
        Duration::from_millis(250)
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
