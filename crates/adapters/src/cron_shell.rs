// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron expression parsing and the managed-block installer that shells out
//! to `crontab` (§4.7).
//!
//! Expression handling is grounded on the same `cron` + `chrono_tz`
//! combination used elsewhere in the ecosystem for schedule computation,
//! generalized here into pure functions with no persisted job state — the
//! queue is Clodputer's only durable state, so the cron layer just
//! generates and installs `crontab` lines.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::process::Stdio;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, CRONTAB_TIMEOUT};

pub const MANAGED_BLOCK_START: &str = "# >>> clodputer managed >>>";
pub const MANAGED_BLOCK_END: &str = "# <<< clodputer managed <<<";

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },
    #[error("invalid timezone `{0}`")]
    InvalidTimezone(String),
    #[error("crontab command failed: {0}")]
    Crontab(String),
}

/// Expand named macros (`@hourly`, `@daily`, `@weekly`, plus the extended
/// `@workdays`/`@weekends` set) and normalize bare 5-field expressions to
/// the 6-field (seconds-first) syntax the `cron` crate expects.
fn normalize(expr: &str) -> String {
    let trimmed = expr.trim();
    let expanded = match trimmed {
        "@hourly" => "0 0 * * * *",
        "@daily" => "0 0 0 * * *",
        "@weekly" => "0 0 0 * * 0",
        "@workdays" => "0 0 0 * * 1-5",
        "@weekends" => "0 0 0 * * 0,6",
        other => other,
    };
    if expanded.split_whitespace().count() == 5 {
        format!("0 {expanded}")
    } else {
        expanded.to_string()
    }
}

/// Parse `expr` into a [`Schedule`], surfacing a field-level error message.
pub fn validate_expression(expr: &str) -> Result<Schedule, CronError> {
    let normalized = normalize(expr);
    Schedule::from_str(&normalized).map_err(|e| CronError::InvalidExpression {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

fn resolve_tz(timezone: Option<&str>) -> Result<Tz, CronError> {
    match timezone {
        None => Ok(Tz::UTC),
        Some(name) => Tz::from_str(name).map_err(|_| CronError::InvalidTimezone(name.to_string())),
    }
}

/// The next `n` fire times for `expr` in `timezone` (UTC if unset).
pub fn next_runs(expr: &str, timezone: Option<&str>, n: usize) -> Result<Vec<DateTime<Utc>>, CronError> {
    let schedule = validate_expression(expr)?;
    let tz = resolve_tz(timezone)?;
    Ok(schedule
        .upcoming(tz)
        .take(n)
        .map(|dt| dt.with_timezone(&Utc))
        .collect())
}

/// One generated crontab line for a scheduled task.
pub struct CronEntry {
    pub task_name: String,
    pub expression: String,
    pub timezone: Option<String>,
    pub executor_path: String,
    pub cron_log_path: String,
}

impl CronEntry {
    fn render(&self) -> String {
        let normalized = normalize(&self.expression);
        let tz_prefix = self
            .timezone
            .as_ref()
            .map(|tz| format!("TZ={tz} "))
            .unwrap_or_default();
        format!(
            "{normalized} {tz_prefix}{exe} run {task} >> {log} 2>&1",
            normalized = normalized,
            tz_prefix = tz_prefix,
            exe = self.executor_path,
            task = self.task_name,
            log = self.cron_log_path,
        )
    }
}

/// Read the current user crontab, or an empty string if none is installed.
pub async fn read_crontab() -> Result<String, CronError> {
    let mut cmd = Command::new("crontab");
    cmd.arg("-l").stdin(Stdio::null());
    match run_with_timeout(cmd, CRONTAB_TIMEOUT, "crontab -l").await {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(_) => Ok(String::new()), // "no crontab for user" exits non-zero
        Err(e) => Err(CronError::Crontab(e)),
    }
}

/// Replace the installed crontab with `contents`.
async fn write_crontab(contents: &str) -> Result<(), CronError> {
    use std::io::Write;
    use std::process::Command as StdCommand;
    let mut child = StdCommand::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| CronError::Crontab(e.to_string()))?;
    child
        .stdin
        .take()
        .ok_or_else(|| CronError::Crontab("no stdin handle".to_string()))?
        .write_all(contents.as_bytes())
        .map_err(|e| CronError::Crontab(e.to_string()))?;
    let status = child.wait().map_err(|e| CronError::Crontab(e.to_string()))?;
    if !status.success() {
        return Err(CronError::Crontab(format!("crontab - exited with {status}")));
    }
    Ok(())
}

/// Strip any existing managed block from `crontab_text`.
fn strip_managed_block(crontab_text: &str) -> String {
    let mut out = Vec::new();
    let mut inside = false;
    for line in crontab_text.lines() {
        if line.trim() == MANAGED_BLOCK_START {
            inside = true;
            continue;
        }
        if line.trim() == MANAGED_BLOCK_END {
            inside = false;
            continue;
        }
        if !inside {
            out.push(line);
        }
    }
    out.join("\n")
}

/// The interior lines of the installed managed block (sentinels stripped),
/// or `None` if no managed block is present in `crontab_text`.
pub fn extract_managed_block(crontab_text: &str) -> Option<String> {
    let mut inside = false;
    let mut lines = Vec::new();
    let mut found = false;
    for line in crontab_text.lines() {
        if line.trim() == MANAGED_BLOCK_START {
            inside = true;
            found = true;
            continue;
        }
        if line.trim() == MANAGED_BLOCK_END {
            inside = false;
            continue;
        }
        if inside {
            lines.push(line);
        }
    }
    found.then(|| lines.join("\n"))
}

/// The rendered entry lines for `entries`, joined without sentinels — the
/// shape a correctly-installed managed block's interior should match.
pub fn render_entries(entries: &[CronEntry]) -> String {
    entries
        .iter()
        .map(CronEntry::render)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_block(entries: &[CronEntry]) -> String {
    let mut block = String::new();
    block.push_str(MANAGED_BLOCK_START);
    block.push('\n');
    for entry in entries {
        block.push_str(&entry.render());
        block.push('\n');
    }
    block.push_str(MANAGED_BLOCK_END);
    block
}

/// A preview of what `install` would change, without touching the crontab.
pub struct InstallDiff {
    pub before: String,
    pub after: String,
}

pub fn preview(entries: &[CronEntry], current_crontab: &str) -> InstallDiff {
    let stripped = strip_managed_block(current_crontab);
    let after = format!("{}\n{}\n", stripped.trim_end(), render_block(entries));
    InstallDiff {
        before: current_crontab.to_string(),
        after,
    }
}

/// Install the managed block, replacing any prior one. Returns the prior
/// full crontab contents as a backup for [`uninstall`].
pub async fn install(entries: &[CronEntry]) -> Result<String, CronError> {
    let current = read_crontab().await?;
    let diff = preview(entries, &current);
    write_crontab(&diff.after).await?;
    Ok(diff.before)
}

/// Remove the managed block, restoring from `backup` if given, otherwise
/// stripping the block by sentinel from whatever is currently installed.
pub async fn uninstall(backup: Option<&str>) -> Result<(), CronError> {
    match backup {
        Some(prior) => write_crontab(prior).await,
        None => {
            let current = read_crontab().await?;
            let stripped = strip_managed_block(&current);
            write_crontab(&format!("{}\n", stripped.trim_end())).await
        }
    }
}

#[cfg(test)]
#[path = "cron_shell_tests.rs"]
mod tests;
