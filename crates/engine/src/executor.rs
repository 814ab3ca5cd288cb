// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives the queue end-to-end with strict one-at-a-time semantics (§4.6).
//!
//! The executor owns the lockfile for its whole lifetime: as long as this
//! struct is alive, no other executor process can mutate the same state
//! directory's queue.

use crate::config;
use crate::env_config::EnvConfig;
use crate::paths::StateDir;
use chrono::Utc;
use clodputer_adapters::{process_tree, NotifyAdapter, SpawnOutcome};
use clodputer_core::{EventKind, LogEvent, OnOutcomeAction, QueueItem, QueueItemId, TaskConfig};
use clodputer_storage::{FailOutcome, Lockfile, MetricsStore, Queue, StructuredLogger};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tracing::warn;

pub use crate::error::ExecutorError;

/// Optional CPU/memory ceilings; exceeding either defers (not fails) the
/// next eligible task without consuming a retry attempt.
#[derive(Debug, Clone, Default)]
pub struct ResourceThresholds {
    pub max_cpu_percent: Option<f32>,
    pub max_memory_percent: Option<f32>,
}

/// Outcome of a single [`Executor::run_one`] call, returned so callers
/// (the CLI's `run` command, `run_until_idle`) can decide whether to keep
/// draining and what exit code to report.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing eligible to run right now.
    Idle,
    /// A task ran and reached `success` or a retryable/terminal failure.
    Ran { task_name: String, success: bool },
    /// The item was dropped without running: bad config or disabled.
    Skipped { task_name: String },
    /// Deferred by the resource gate; not counted as an attempt.
    Deferred { task_name: String },
}

pub struct Executor<N: NotifyAdapter> {
    state_dir: StateDir,
    tasks_dir: std::path::PathBuf,
    queue: Queue,
    logger: StructuredLogger,
    metrics: MetricsStore,
    _lock: Lockfile,
    notifier: N,
    env_config: EnvConfig,
    resource_thresholds: ResourceThresholds,
    system: System,
}

impl<N: NotifyAdapter> Executor<N> {
    /// Acquire the lock and open the queue/logger/metrics stores rooted at
    /// `state_dir`. Fatal (`ExecutorError::Lock(LockError::Held(pid))`) if
    /// another executor already holds the lock.
    pub fn open(
        state_dir: StateDir,
        notifier: N,
        resource_thresholds: ResourceThresholds,
    ) -> Result<Self, ExecutorError> {
        state_dir.ensure_exists()?;
        let lock = Lockfile::acquire(state_dir.lock_path())?;
        let logger = StructuredLogger::new(state_dir.execution_log_path(), state_dir.archive_dir());
        let queue = Queue::open(state_dir.queue_path())?;
        if queue.recovered_from_corruption() {
            logger.event(&LogEvent::new(
                EventKind::QueueRecoveredFromCorruption,
                Utc::now(),
            ));
        }
        let metrics = MetricsStore::open(state_dir.metrics_path())?;
        let env_config = EnvConfig::load(&state_dir.env_json_path())?;
        logger.event(&LogEvent::new(EventKind::LockAcquired, Utc::now()));

        Ok(Self {
            tasks_dir: state_dir.tasks_dir(),
            state_dir,
            queue,
            logger,
            metrics,
            _lock: lock,
            notifier,
            env_config,
            resource_thresholds,
            system: System::new(),
        })
    }

    pub fn enqueue_manual(
        &self,
        name: &str,
        priority: clodputer_core::Priority,
    ) -> Result<QueueItemId, ExecutorError> {
        let now = Utc::now();
        let id = self.queue.enqueue(name, priority, HashMap::new(), now)?;
        self.logger.event(
            &LogEvent::new(EventKind::TaskEnqueued, now).with_task_name(name),
        );
        Ok(id)
    }

    /// Run one eligible item to completion, per the 11-step algorithm in
    /// §4.6. Returns `Idle` when the queue has nothing eligible right now.
    pub async fn run_one(&mut self) -> Result<RunOutcome, ExecutorError> {
        let now = Utc::now();
        let Some(item) = self.queue.peek(now) else {
            return Ok(RunOutcome::Idle);
        };

        let config = match config::load(&self.tasks_dir, &item.name) {
            Ok(config) => config,
            Err(err) => {
                self.drop_item(&item, EventKind::TaskConfigError, Some(err.to_string()))?;
                return Ok(RunOutcome::Skipped {
                    task_name: item.name,
                });
            }
        };

        if !config.enabled {
            self.drop_item(&item, EventKind::TaskDisabledSkipped, None)?;
            return Ok(RunOutcome::Skipped {
                task_name: item.name,
            });
        }

        if let Some(reason) = self.resource_gate_reason() {
            let delay = Duration::from_secs(5);
            let not_before = self.queue.defer(item.id, delay, now)?;
            self.logger.event(
                &LogEvent::new(EventKind::TaskDeferred, now)
                    .with_task_name(&item.name)
                    .with_task_id(item.id.to_string())
                    .with_extra("reason", reason)
                    .with_extra("not_before", not_before.to_rfc3339()),
            );
            return Ok(RunOutcome::Deferred {
                task_name: item.name,
            });
        }

        let success = self.execute(item.clone(), &config).await?;
        Ok(RunOutcome::Ran {
            task_name: item.name,
            success,
        })
    }

    /// Repeat `run_one` until the queue has nothing eligible left.
    pub async fn run_until_idle(&mut self) -> Result<Vec<RunOutcome>, ExecutorError> {
        let mut outcomes = Vec::new();
        loop {
            match self.run_one().await? {
                RunOutcome::Idle => break,
                outcome => outcomes.push(outcome),
            }
        }
        Ok(outcomes)
    }

    /// Promote a queued item straight to removed, without ever spawning a
    /// child — used for config errors and disabled tasks (§4.6 steps 2-3).
    fn drop_item(
        &self,
        item: &QueueItem,
        kind: EventKind,
        error: Option<String>,
    ) -> Result<(), ExecutorError> {
        let now = Utc::now();
        self.queue.promote_running(item.id, 0, now)?;
        self.queue
            .fail(item.id, false, &Default::default(), now)?;
        let mut event = LogEvent::new(kind, now)
            .with_task_name(&item.name)
            .with_task_id(item.id.to_string());
        if let Some(error) = error {
            event = event.with_error(error);
        }
        self.logger.event(&event);
        Ok(())
    }

    fn resource_gate_reason(&mut self) -> Option<String> {
        let thresholds = self.resource_thresholds.clone();
        if thresholds.max_cpu_percent.is_none() && thresholds.max_memory_percent.is_none() {
            return None;
        }
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        if let Some(max_cpu) = thresholds.max_cpu_percent {
            let cpu = self.system.global_cpu_usage();
            if cpu > max_cpu {
                return Some(format!("cpu usage {cpu:.1}% exceeds threshold {max_cpu:.1}%"));
            }
        }
        if let Some(max_mem) = thresholds.max_memory_percent {
            let total = self.system.total_memory().max(1);
            let used = self.system.used_memory();
            let percent = (used as f32 / total as f32) * 100.0;
            if percent > max_mem {
                return Some(format!(
                    "memory usage {percent:.1}% exceeds threshold {max_mem:.1}%"
                ));
            }
        }
        None
    }

    /// Steps 5-11 of §4.6: build the invocation, spawn, wait, clean up,
    /// record the outcome, and run the task's on-outcome actions.
    async fn execute(&mut self, item: QueueItem, config: &TaskConfig) -> Result<bool, ExecutorError> {
        let started_at = Utc::now();
        let mut command = self.build_invocation(config);

        let spawn_result = command.spawn();
        let mut child = match spawn_result {
            Ok(child) => child,
            Err(err) => {
                self.queue.promote_running(item.id, 0, started_at)?;
                self.fail_and_record(&item, config, started_at, false, err.to_string())?;
                return Ok(false);
            }
        };
        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            self.queue.promote_running(item.id, 0, started_at)?;
            self.fail_and_record(
                &item,
                config,
                started_at,
                false,
                "child exited before its pid could be observed".to_string(),
            )?;
            return Ok(false);
        };

        self.queue.promote_running(item.id, pid, started_at)?;
        self.logger.event(
            &LogEvent::new(EventKind::TaskStarted, started_at)
                .with_task_name(&config.name)
                .with_task_id(item.id.to_string()),
        );

        let timeout = config.task.timeout();
        let wait = tokio::time::timeout(timeout, child.wait_with_output());
        let spawn_outcome = match wait.await {
            Ok(Ok(output)) => SpawnOutcome::Completed(output),
            Ok(Err(err)) => {
                self.fail_and_record(&item, config, started_at, true, err.to_string())?;
                return Ok(false);
            }
            Err(_elapsed) => SpawnOutcome::TimedOut { pid },
        };

        let cleanup_report = process_tree::cleanup(pid);
        if cleanup_report.killed.len() + cleanup_report.orphans_swept.len() > 0 {
            self.logger.event(
                &LogEvent::new(EventKind::CleanupKilled, Utc::now())
                    .with_task_name(&config.name)
                    .with_task_id(item.id.to_string())
                    .with_extra("killed", &cleanup_report.killed)
                    .with_extra("orphans_swept", &cleanup_report.orphans_swept),
            );
        }

        match spawn_outcome {
            SpawnOutcome::TimedOut { .. } => {
                self.fail_and_record(
                    &item,
                    config,
                    started_at,
                    true,
                    format!("timed out after {}s", config.task.timeout_seconds),
                )?;
                self.logger.event(
                    &LogEvent::new(EventKind::TaskTimeout, Utc::now())
                        .with_task_name(&config.name)
                        .with_task_id(item.id.to_string()),
                );
                Ok(false)
            }
            SpawnOutcome::Completed(output) => {
                let return_code = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let parsed = parse_result_envelope(&stdout);
                let transient = matches!(return_code, 124 | 137);
                let success = output.status.success() && parsed.as_ref().map(|p| !p.error_flag()).unwrap_or(true);

                let duration = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;
                self.metrics.record_outcome(
                    &config.name,
                    if success { "success" } else { "failure" },
                    duration,
                    Utc::now(),
                )?;

                if success {
                    self.queue.complete(item.id)?;
                    self.logger.event(
                        &LogEvent::new(EventKind::TaskCompleted, Utc::now())
                            .with_task_name(&config.name)
                            .with_task_id(item.id.to_string())
                            .with_duration(duration)
                            .with_return_code(return_code),
                    );
                    self.run_outcome_actions(&config.on_success, config, None);
                } else {
                    let error = parsed
                        .and_then(|p| p.error)
                        .unwrap_or_else(|| format!("exit code {return_code}"));
                    self.fail_and_record(&item, config, started_at, transient, error.clone())?;
                    self.run_outcome_actions(&config.on_failure, config, Some(&error));
                }
                Ok(success)
            }
        }
    }

    fn fail_and_record(
        &self,
        item: &QueueItem,
        config: &TaskConfig,
        started_at: chrono::DateTime<Utc>,
        retryable: bool,
        error: String,
    ) -> Result<(), ExecutorError> {
        let now = Utc::now();
        let duration = (now - started_at).num_milliseconds() as f64 / 1000.0;
        self.metrics.record_outcome(&config.name, "failure", duration, now)?;
        let outcome = self.queue.fail(item.id, retryable, &config.retry, now)?;
        let mut event = LogEvent::new(EventKind::TaskFailed, now)
            .with_task_name(&config.name)
            .with_task_id(item.id.to_string())
            .with_error(error);
        if let FailOutcome::Retried { attempt_count, not_before } = &outcome {
            event = event
                .with_extra("attempt_count", attempt_count)
                .with_extra("not_before", not_before.to_rfc3339());
            self.logger.event(&LogEvent::new(EventKind::RetryScheduled, now).with_task_name(&config.name));
        }
        self.logger.event(&event);
        Ok(())
    }

    fn run_outcome_actions(&self, actions: &[OnOutcomeAction], config: &TaskConfig, error: Option<&str>) {
        for action in actions {
            match action {
                OnOutcomeAction::Log { template } => {
                    let message = render_template(template, &config.name, error);
                    tracing::info!(task = %config.name, "{message}");
                }
                OnOutcomeAction::Notify { notify } if *notify => {
                    let title = format!("clodputer: {}", config.name);
                    let body = error.unwrap_or("completed successfully");
                    let notifier = self.notifier.clone();
                    let title_owned = title;
                    let body_owned = body.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = notifier.notify(&title_owned, &body_owned).await {
                            warn!(error = %e, "desktop notification failed");
                        }
                    });
                }
                OnOutcomeAction::Notify { .. } => {}
            }
        }
    }

    fn build_invocation(&self, config: &TaskConfig) -> Command {
        let mut command = Command::new(self.env_config.resolve_cli_path());
        command.arg(&config.task.prompt);
        command.arg("--output-format").arg("json");
        command.arg("--permission-mode").arg(permission_mode_flag(config.task.permission_mode));
        if !config.task.allowed_tools.is_empty() {
            let tools = config
                .task
                .allowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",");
            command.arg("--allowedTools").arg(tools);
        }
        if !config.task.disallowed_tools.is_empty() {
            let tools = config
                .task
                .disallowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",");
            command.arg("--disallowedTools").arg(tools);
        }
        if let Some(mcp_path) = &config.task.mcp_config_path {
            command.arg("--mcp-config").arg(mcp_path);
        }
        command.arg("--timeout").arg(config.task.timeout_seconds.to_string());
        for extra in self.env_config.resolve_extra_args() {
            command.arg(extra);
        }
        for (key, value) in &config.task.context {
            command.env(key, value);
        }
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.kill_on_drop(true);
        command
    }
}

fn permission_mode_flag(mode: clodputer_core::PermissionMode) -> &'static str {
    use clodputer_core::PermissionMode::*;
    match mode {
        Prompt => "prompt",
        AcceptEdits => "accept-edits",
        RejectEdits => "reject-edits",
    }
}

fn render_template(template: &str, task_name: &str, error: Option<&str>) -> String {
    template
        .replace("{{ task_name }}", task_name)
        .replace("{{ error }}", error.unwrap_or(""))
}

#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ResultEnvelope {
    fn error_flag(&self) -> bool {
        self.error.is_some() || self.status.as_deref() == Some("error")
    }
}

/// Parse the trailing JSON document in `stdout`, tolerant of a surrounding
/// ```` ``` ```` code fence (§4.6 step 8, §7 `OutputUnparseable`).
fn parse_result_envelope(stdout: &str) -> Option<ResultEnvelope> {
    let trimmed = stdout.trim();
    let candidate = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(str::trim)
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str(candidate).ok()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
