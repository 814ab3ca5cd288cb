// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State directory layout (§6 filesystem layout).

use std::path::{Path, PathBuf};

const STATE_DIR_ENV: &str = "CLODPUTER_HOME";

/// Resolves every on-disk location the runtime reads or writes, rooted at
/// a single state directory (default `~/.clodputer/`).
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Resolve the root from `CLODPUTER_HOME`, falling back to
    /// `~/.clodputer/`.
    pub fn resolve() -> Self {
        let root = std::env::var(STATE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".clodputer")
            });
        Self { root }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.root.join("queue.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("clodputer.lock")
    }

    pub fn execution_log_path(&self) -> PathBuf {
        self.root.join("execution.log")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.root.join("metrics.json")
    }

    pub fn watcher_pid_path(&self) -> PathBuf {
        self.root.join("watcher.pid")
    }

    pub fn watcher_log_path(&self) -> PathBuf {
        self.root.join("watcher.log")
    }

    pub fn cron_log_path(&self) -> PathBuf {
        self.root.join("cron.log")
    }

    /// The pre-install crontab snapshot, restored by `uninstall` (§4.7).
    pub fn cron_backup_path(&self) -> PathBuf {
        self.root.join("cron.backup")
    }

    pub fn env_json_path(&self) -> PathBuf {
        self.root.join("env.json")
    }

    pub fn onboarding_marker_path(&self) -> PathBuf {
        self.root.join(".onboarded")
    }

    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.tasks_dir())?;
        std::fs::create_dir_all(self.archive_dir())
    }
}
