// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer status` — running item (with elapsed), queued items, recent
//! executions, today's counts.

use crate::color;
use anyhow::Result;
use chrono::Utc;
use clodputer_executor::StateDir;
use clodputer_storage::{MetricsStore, Queue, StructuredLogger};

pub fn handle(state_dir: &StateDir) -> Result<()> {
    let queue = Queue::open(state_dir.queue_path())?;
    let snapshot = queue.snapshot();
    let now = Utc::now();

    println!("{}", color::header("Running"));
    match &snapshot.running {
        Some(item) => {
            let elapsed = item
                .started_at
                .map(|s| (now - s).num_seconds())
                .unwrap_or(0);
            println!(
                "  {} (pid {}, {}s elapsed)",
                item.name,
                item.pid.unwrap_or(0),
                elapsed
            );
        }
        None => println!("  (none)"),
    }

    println!();
    println!("{} ({})", color::header("Queued"), snapshot.queued.len());
    for item in &snapshot.queued {
        println!(
            "  {} [{:?}] attempt {} not_before {}",
            item.name, item.priority, item.attempt_count, item.not_before
        );
    }

    let logger = StructuredLogger::new(state_dir.execution_log_path(), state_dir.archive_dir());
    let recent = logger.tail(10)?;
    println!();
    println!("{}", color::header("Recent executions"));
    if recent.is_empty() {
        println!("  (none)");
    }
    for event in &recent {
        println!(
            "  {} {:?} {}",
            event.timestamp,
            event.event,
            event.task_name.as_deref().unwrap_or("-")
        );
    }

    let metrics = MetricsStore::open(state_dir.metrics_path())?;
    println!();
    println!("{}", color::header("Today's counts"));
    let today = now.date_naive();
    for (name, record) in metrics.all() {
        let ran_today = record
            .last_run_at
            .map(|t| t.date_naive() == today)
            .unwrap_or(false);
        if ran_today {
            println!(
                "  {name}: {} success, {} failure (last: {})",
                record.success_count,
                record.failure_count,
                record.last_status.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}
