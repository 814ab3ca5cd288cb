// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generates the managed crontab block from configured cron tasks and
//! delegates the actual `crontab` shell-out to `clodputer_adapters::cron_shell`
//! (§4.7).

use crate::paths::StateDir;
use chrono::{DateTime, Utc};
use clodputer_adapters::cron_shell::{self, CronEntry, CronError, InstallDiff};
use clodputer_core::{TaskConfig, Trigger};

/// Build one [`CronEntry`] per cron-triggered task, skipping disabled ones:
/// a disabled task should not occupy a crontab slot.
pub fn entries_for(tasks: &[TaskConfig], state_dir: &StateDir, executor_path: &str) -> Vec<CronEntry> {
    tasks
        .iter()
        .filter(|t| t.enabled)
        .filter_map(|t| match &t.trigger {
            Trigger::Cron { expression, timezone } => Some(CronEntry {
                task_name: t.name.clone(),
                expression: expression.clone(),
                timezone: timezone.clone(),
                executor_path: executor_path.to_string(),
                cron_log_path: state_dir.cron_log_path().to_string_lossy().into_owned(),
            }),
            _ => None,
        })
        .collect()
}

pub async fn install(entries: &[CronEntry]) -> Result<String, CronError> {
    cron_shell::install(entries).await
}

pub async fn uninstall(backup: Option<&str>) -> Result<(), CronError> {
    cron_shell::uninstall(backup).await
}

pub fn preview(entries: &[CronEntry], current_crontab: &str) -> InstallDiff {
    cron_shell::preview(entries, current_crontab)
}

pub fn validate_expression(expr: &str) -> Result<(), CronError> {
    cron_shell::validate_expression(expr).map(|_| ())
}

pub fn next_runs(expr: &str, timezone: Option<&str>, n: usize) -> Result<Vec<DateTime<Utc>>, CronError> {
    cron_shell::next_runs(expr, timezone, n)
}

/// The installed crontab's managed block interior, if any.
pub async fn installed_block() -> Result<Option<String>, CronError> {
    let current = cron_shell::read_crontab().await?;
    Ok(cron_shell::extract_managed_block(&current))
}

/// What the managed block's interior should contain for `entries`.
pub fn expected_block(entries: &[CronEntry]) -> String {
    cron_shell::render_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clodputer_core::{OnOutcomeAction, PermissionMode, RetryPolicy, TaskSpec};
    use std::collections::HashMap;

    fn task(name: &str, trigger: Trigger, enabled: bool) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            description: None,
            enabled,
            priority: Default::default(),
            trigger,
            task: TaskSpec {
                prompt: "go".to_string(),
                allowed_tools: vec![],
                disallowed_tools: vec![],
                permission_mode: PermissionMode::Prompt,
                timeout_seconds: 30,
                context: HashMap::new(),
                mcp_config_path: None,
            },
            retry: RetryPolicy::default(),
            on_success: Vec::<OnOutcomeAction>::new(),
            on_failure: Vec::<OnOutcomeAction>::new(),
        }
    }

    #[test]
    fn only_enabled_cron_tasks_produce_entries() {
        let tasks = vec![
            task(
                "nightly",
                Trigger::Cron {
                    expression: "@daily".to_string(),
                    timezone: None,
                },
                true,
            ),
            task(
                "disabled",
                Trigger::Cron {
                    expression: "@daily".to_string(),
                    timezone: None,
                },
                false,
            ),
            task("manual", Trigger::Manual, true),
        ];
        let state_dir = StateDir::at("/tmp/cp-cron-test");
        let entries = entries_for(&tasks, &state_dir, "/usr/local/bin/clodputer");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_name, "nightly");
    }
}
