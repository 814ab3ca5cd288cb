// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon wiring around `clodputer_adapters::watcher`'s `notify` plumbing
//! (§4.8): turns `file_watch` task triggers into queue enqueues, tracks the
//! daemon's own pidfile, and restarts the observer on a fatal `notify`
//! error instead of exiting — exit is reserved for an explicit stop signal.

use crate::config;
use crate::paths::StateDir;
use clodputer_adapters::watcher::{FsWatcher, WatchRegistration, WatcherError};
use clodputer_core::{Priority, Trigger};
use clodputer_storage::{Queue, QueueError, StructuredLogger};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum WatchDaemonError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("a watcher daemon is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("no watcher daemon is running")]
    NotRunning,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchStatus {
    Stopped,
    Running { pid: u32 },
}

/// The delay before an observer restart after a fatal `notify` error.
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Read the watcher pidfile and report whether that pid is still live.
pub fn status(state_dir: &StateDir) -> WatchStatus {
    match std::fs::read_to_string(state_dir.watcher_pid_path()) {
        Ok(contents) => match contents.trim().parse::<u32>() {
            Ok(pid) if is_live(pid) => WatchStatus::Running { pid },
            _ => WatchStatus::Stopped,
        },
        Err(_) => WatchStatus::Stopped,
    }
}

fn is_live(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}

fn write_pidfile(state_dir: &StateDir) -> io::Result<()> {
    std::fs::write(state_dir.watcher_pid_path(), std::process::id().to_string())
}

fn remove_pidfile(state_dir: &StateDir) {
    let _ = std::fs::remove_file(state_dir.watcher_pid_path());
}

/// Signal a running daemon to stop; idempotent removal of a stale pidfile
/// counts as success since there is nothing left to stop.
pub fn stop(state_dir: &StateDir) -> Result<(), WatchDaemonError> {
    match status(state_dir) {
        WatchStatus::Running { pid } => {
            signal::kill(NixPid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(|e| WatchDaemonError::Io(io::Error::from(e)))?;
            remove_pidfile(state_dir);
            Ok(())
        }
        WatchStatus::Stopped => {
            remove_pidfile(state_dir);
            Err(WatchDaemonError::NotRunning)
        }
    }
}

fn registrations_for(tasks: &[clodputer_core::TaskConfig]) -> Vec<WatchRegistration> {
    tasks
        .iter()
        .filter(|t| t.enabled)
        .filter_map(|t| match &t.trigger {
            Trigger::FileWatch {
                path,
                pattern,
                event,
                debounce_ms,
            } => Some(WatchRegistration {
                task_name: t.name.clone(),
                path: Path::new(path).to_path_buf(),
                pattern: pattern.clone(),
                event: *event,
                debounce_ms: *debounce_ms,
            }),
            _ => None,
        })
        .collect()
}

/// Run the watcher in the foreground until `should_stop` reports true
/// between restart cycles. Each accepted triggered run is enqueued with
/// `path`/`event`/`timestamp` metadata for the executor to consume.
pub fn run(state_dir: &StateDir, should_stop: impl Fn() -> bool) -> Result<(), WatchDaemonError> {
    if let WatchStatus::Running { pid } = status(state_dir) {
        return Err(WatchDaemonError::AlreadyRunning(pid));
    }
    write_pidfile(state_dir)?;
    let result = run_inner(state_dir, should_stop);
    remove_pidfile(state_dir);
    result
}

fn run_inner(state_dir: &StateDir, should_stop: impl Fn() -> bool) -> Result<(), WatchDaemonError> {
    let logger = StructuredLogger::new(state_dir.watcher_log_path(), state_dir.archive_dir());
    let queue = Queue::open(state_dir.queue_path())?;

    while !should_stop() {
        let (tasks, load_errors) = config::load_all(&state_dir.tasks_dir());
        for (path, err) in &load_errors {
            warn!(path = %path.display(), error = %err, "skipping unreadable task definition");
        }
        let registrations = registrations_for(&tasks);
        if registrations.is_empty() {
            info!("no enabled file_watch tasks configured; idling");
            std::thread::sleep(RESTART_DELAY);
            continue;
        }

        let watcher = match FsWatcher::start(registrations) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "failed to start filesystem observer, retrying");
                std::thread::sleep(RESTART_DELAY);
                continue;
            }
        };

        loop {
            if should_stop() {
                return Ok(());
            }
            match watcher.try_recv() {
                Some(triggered) => {
                    let now = triggered.timestamp;
                    let mut metadata = HashMap::new();
                    metadata.insert("path".to_string(), triggered.path.to_string_lossy().into_owned());
                    metadata.insert("event".to_string(), format!("{:?}", triggered.event));
                    metadata.insert("timestamp".to_string(), now.to_rfc3339());
                    match queue.enqueue(&triggered.task_name, Priority::Normal, metadata, now) {
                        Ok(id) => {
                            let event = clodputer_core::LogEvent::new(
                                clodputer_core::EventKind::WatcherTriggered,
                                now,
                            )
                            .with_task_name(triggered.task_name.clone())
                            .with_task_id(id.to_string());
                            logger.event(&event);
                        }
                        Err(e) => warn!(task = %triggered.task_name, error = %e, "failed to enqueue triggered run"),
                    }
                }
                None => std::thread::sleep(Duration::from_millis(200)),
            }
        }
    }
    Ok(())
}
