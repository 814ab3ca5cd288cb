// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer logs [--tail N] [--follow] [--task NAME] [--json]`.

use anyhow::Result;
use clap::Args;
use clodputer_core::LogEvent;
use clodputer_executor::StateDir;
use clodputer_storage::StructuredLogger;
use std::thread;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of recent lines to show
    #[arg(long, default_value = "50")]
    pub tail: usize,

    /// Stream new entries as they're appended
    #[arg(long, short)]
    pub follow: bool,

    /// Only show entries for this task
    #[arg(long)]
    pub task: Option<String>,

    /// Emit raw JSON lines instead of formatted text
    #[arg(long)]
    pub json: bool,
}

pub fn handle(args: LogsArgs, state_dir: &StateDir) -> Result<()> {
    let logger = StructuredLogger::new(state_dir.execution_log_path(), state_dir.archive_dir());
    let events = logger.tail(args.tail)?;
    for event in &events {
        print_event(event, args.task.as_deref(), args.json);
    }

    if args.follow {
        let mut follower = logger.follow()?;
        loop {
            for event in follower.poll()? {
                print_event(&event, args.task.as_deref(), args.json);
            }
            thread::sleep(clodputer_storage::LogFollower::poll_interval());
        }
    }

    Ok(())
}

fn print_event(event: &LogEvent, task_filter: Option<&str>, json: bool) {
    if let Some(task) = task_filter {
        if event.task_name.as_deref() != Some(task) {
            return;
        }
    }
    if json {
        if let Ok(line) = event.to_jsonl() {
            print!("{line}");
        }
        return;
    }
    println!(
        "{} {:?} {}{}",
        event.timestamp,
        event.event,
        event.task_name.as_deref().unwrap_or("-"),
        event
            .error
            .as_deref()
            .map(|e| format!(" error={e}"))
            .unwrap_or_default()
    );
}
