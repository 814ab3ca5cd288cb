// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer install [--dry-run]` / `clodputer uninstall` — manage the
//! crontab's managed block (§4.7).

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use clodputer_core::{EventKind, LogEvent};
use clodputer_executor::StateDir;
use clodputer_storage::StructuredLogger;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Show the crontab diff without writing it
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn install(args: InstallArgs, state_dir: &StateDir) -> Result<()> {
    let (tasks, errors) = clodputer_executor::load_all_tasks(&state_dir.tasks_dir());
    for (path, err) in &errors {
        eprintln!("warning: {}: {err}", path.display());
    }

    let executor_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "clodputer".to_string());
    let entries = clodputer_executor::cron::entries_for(&tasks, state_dir, &executor_path);

    if entries.is_empty() {
        println!("no cron-triggered tasks configured; nothing to install");
        return Ok(());
    }

    let current = read_current_crontab().await;
    let diff = clodputer_executor::cron::preview(&entries, &current);

    if args.dry_run {
        println!("--- current crontab ---\n{}", diff.before);
        println!("--- proposed crontab ---\n{}", diff.after);
        return Ok(());
    }

    let backup = clodputer_executor::cron::install(&entries).await?;
    std::fs::write(state_dir.cron_backup_path(), &backup)?;
    let logger = StructuredLogger::new(state_dir.execution_log_path(), state_dir.archive_dir());
    logger.event(&LogEvent::new(EventKind::CronInstalled, Utc::now()));
    println!("installed {} cron entries", entries.len());
    Ok(())
}

pub async fn uninstall(state_dir: &StateDir) -> Result<()> {
    let backup = std::fs::read_to_string(state_dir.cron_backup_path()).ok();
    clodputer_executor::cron::uninstall(backup.as_deref()).await?;
    let _ = std::fs::remove_file(state_dir.cron_backup_path());
    let logger = StructuredLogger::new(state_dir.execution_log_path(), state_dir.archive_dir());
    logger.event(&LogEvent::new(EventKind::CronUninstalled, Utc::now()));
    println!("removed managed crontab block");
    Ok(())
}

async fn read_current_crontab() -> String {
    tokio::process::Command::new("crontab")
        .arg("-l")
        .output()
        .await
        .ok()
        .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
        .unwrap_or_default()
}
