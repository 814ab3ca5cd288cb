// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostics (§4.9): a read-mostly sweep over the state directory that
//! reports what an operator would otherwise have to piece together by
//! hand from several files and two background daemons.

use crate::cron;
use crate::env_config::EnvConfig;
use crate::paths::StateDir;
use crate::watcher;
use clodputer_storage::{Queue, DEFAULT_MAX_ARCHIVES, DEFAULT_MAX_BYTES};
use serde::Serialize;
use std::io::ErrorKind;
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

impl Check {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.into(),
            hint: None,
        }
    }

    fn warn(name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    fn error(name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Run every diagnostic check and return them in a fixed, stable order.
pub async fn run_checks(state_dir: &StateDir) -> Vec<Check> {
    vec![
        check_state_dir(state_dir),
        check_lockfile(state_dir),
        check_queue(state_dir),
        check_task_definitions(state_dir),
        check_cron(state_dir).await,
        check_watcher(state_dir),
        check_cli_path(state_dir),
        check_log_directory(state_dir),
        check_onboarding(state_dir),
    ]
}

fn check_state_dir(state_dir: &StateDir) -> Check {
    match state_dir.ensure_exists() {
        Ok(()) => Check::ok("state_dir", format!("{} exists and is writable", state_dir.root().display())),
        Err(e) => Check::error(
            "state_dir",
            format!("cannot create or write {}: {e}", state_dir.root().display()),
            "check ownership and permissions on the state directory",
        ),
    }
}

fn check_lockfile(state_dir: &StateDir) -> Check {
    let path = state_dir.lock_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Check::ok("lockfile", "no executor lock held");
        }
        Err(e) => return Check::error("lockfile", format!("cannot read lockfile: {e}"), "inspect permissions"),
    };
    match contents.trim().parse::<u32>() {
        Ok(pid) if is_live(pid) => Check::ok("lockfile", format!("executor running (pid {pid})")),
        Ok(pid) => {
            let _ = std::fs::remove_file(&path);
            Check::warn(
                "lockfile",
                format!("removed stale lockfile held by dead pid {pid}"),
                "re-run if a task run was interrupted by this",
            )
        }
        Err(_) => Check::error("lockfile", "lockfile content is not a valid pid", "delete the lockfile manually"),
    }
}

fn check_queue(state_dir: &StateDir) -> Check {
    match Queue::open(state_dir.queue_path()) {
        Ok(queue) => {
            let snapshot = queue.snapshot();
            Check::ok(
                "queue",
                format!(
                    "{} queued, running: {}",
                    snapshot.queued.len(),
                    snapshot.running.is_some()
                ),
            )
        }
        Err(e) => Check::error("queue", format!("queue.json is unreadable: {e}"), "restore from backup or clear the queue"),
    }
}

fn check_task_definitions(state_dir: &StateDir) -> Check {
    let (tasks, errors) = crate::config::load_all(&state_dir.tasks_dir());
    if errors.is_empty() {
        Check::ok("task_definitions", format!("{} task definitions valid", tasks.len()))
    } else {
        Check::warn(
            "task_definitions",
            format!("{} of {} task definitions failed to load", errors.len(), tasks.len() + errors.len()),
            errors
                .iter()
                .map(|(p, e)| format!("{}: {e}", p.display()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

async fn check_cron(state_dir: &StateDir) -> Check {
    let (tasks, _) = crate::config::load_all(&state_dir.tasks_dir());
    let executor_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "clodputer".to_string());
    let expected = cron::entries_for(&tasks, state_dir, &executor_path);
    let expected_block = cron::expected_block(&expected);

    let installed = match cron::installed_block().await {
        Ok(block) => block,
        Err(e) => {
            return Check::warn(
                "cron",
                format!("could not read the installed crontab: {e}"),
                "check that crontab is installed and accessible",
            )
        }
    };

    match (expected.is_empty(), installed) {
        (true, None) => Check::ok("cron", "no cron-triggered tasks configured"),
        (true, Some(_)) => Check::warn(
            "cron",
            "a managed crontab block is installed but no cron-triggered tasks are configured",
            "run the uninstall command to remove the stale block",
        ),
        (false, None) => Check::warn(
            "cron",
            format!("{} cron-triggered tasks configured but no managed crontab block is installed", expected.len()),
            "run the install command",
        ),
        (false, Some(block)) if block.trim() == expected_block.trim() => Check::ok(
            "cron",
            format!("{} cron-triggered tasks configured and installed", expected.len()),
        ),
        (false, Some(_)) => Check::warn(
            "cron",
            "the installed crontab block is out of date with the configured tasks",
            "run the install command to refresh it",
        ),
    }
}

fn check_watcher(state_dir: &StateDir) -> Check {
    match watcher::status(state_dir) {
        watcher::WatchStatus::Running { pid } => Check::ok("watcher", format!("watcher daemon running (pid {pid})")),
        watcher::WatchStatus::Stopped => {
            let (tasks, _) = crate::config::load_all(&state_dir.tasks_dir());
            let has_file_watch = tasks
                .iter()
                .any(|t| matches!(t.trigger, clodputer_core::Trigger::FileWatch { .. }));
            if has_file_watch {
                Check::warn(
                    "watcher",
                    "file_watch tasks are configured but the watcher daemon is not running",
                    "start it with the watch command",
                )
            } else {
                Check::ok("watcher", "watcher daemon not running (no file_watch tasks configured)")
            }
        }
    }
}

fn check_cli_path(state_dir: &StateDir) -> Check {
    let env_config = EnvConfig::load(&state_dir.env_json_path()).unwrap_or_default();
    let cli_path = env_config.resolve_cli_path();
    if which(&cli_path) {
        Check::ok("llm_cli", format!("{cli_path} is executable"))
    } else {
        Check::error(
            "llm_cli",
            format!("{cli_path} was not found on PATH or as an executable file"),
            "set CLODPUTER_CLI_PATH or configure cli_path in env.json",
        )
    }
}

fn which(cli_path: &str) -> bool {
    let path = std::path::Path::new(cli_path);
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(cli_path).is_file())
        })
        .unwrap_or(false)
}

/// Total bytes the active log plus its archives are allowed to occupy
/// before a run is considered over budget: one active file at the rotation
/// threshold plus the retained archive generations.
fn log_size_budget() -> u64 {
    DEFAULT_MAX_BYTES * (DEFAULT_MAX_ARCHIVES as u64 + 1)
}

fn dir_size(dir: &std::path::Path) -> std::io::Result<u64> {
    let mut total = 0;
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                total += entry?.metadata()?.len();
            }
            Ok(total)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

fn check_log_directory(state_dir: &StateDir) -> Check {
    let path = state_dir.execution_log_path();
    let active_size = match path.metadata() {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Check::ok("logs", format!("no execution log yet at {}", path.display()))
        }
        Err(e) => return Check::warn("logs", format!("cannot stat execution log: {e}"), "check permissions"),
    };
    let archive_size = match dir_size(&state_dir.archive_dir()) {
        Ok(size) => size,
        Err(e) => return Check::warn("logs", format!("cannot stat archive directory: {e}"), "check permissions"),
    };
    let total = active_size + archive_size;
    let budget = log_size_budget();
    if total > budget {
        Check::warn(
            "logs",
            format!(
                "execution log and archives occupy {total} bytes, over the {budget} byte budget"
            ),
            "prune old archives under the archive directory",
        )
    } else {
        Check::ok(
            "logs",
            format!("logging to {} ({total} of {budget} bytes used)", path.display()),
        )
    }
}

fn check_onboarding(state_dir: &StateDir) -> Check {
    if state_dir.onboarding_marker_path().is_file() {
        Check::ok("onboarding", "onboarding complete")
    } else {
        Check::warn(
            "onboarding",
            "onboarding has not been completed",
            "run the install command to finish first-time setup",
        )
    }
}

fn is_live(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}
