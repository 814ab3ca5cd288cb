// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer schedule-preview <task> [--count N]` — next N fire times for
//! a cron-triggered task.

use anyhow::Result;
use clap::Args;
use clodputer_core::Trigger;
use clodputer_executor::StateDir;

#[derive(Args, Debug)]
pub struct SchedulePreviewArgs {
    /// Task name
    pub task: String,

    /// Number of upcoming fire times to show
    #[arg(long, default_value = "5")]
    pub count: usize,
}

pub fn handle(args: SchedulePreviewArgs, state_dir: &StateDir) -> Result<()> {
    let config = clodputer_executor::load_task(&state_dir.tasks_dir(), &args.task)?;
    let Trigger::Cron { expression, timezone } = &config.trigger else {
        anyhow::bail!("task '{}' does not have a cron trigger", args.task);
    };

    let runs = clodputer_executor::cron::next_runs(expression, timezone.as_deref(), args.count)?;
    for run in runs {
        println!("{}", run.to_rfc3339());
    }
    Ok(())
}
