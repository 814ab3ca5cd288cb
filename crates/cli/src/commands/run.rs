// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer run <task>` — enqueue, and unless `--enqueue-only`, drain
//! the queue inline (§6, §5 "Mutual exclusion").

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use clodputer_adapters::DesktopNotifyAdapter;
use clodputer_core::Priority;
use clodputer_executor::{Executor, ResourceThresholds, RunOutcome, StateDir};
use clodputer_storage::{LockError, Queue};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task name (matches a file under tasks/)
    pub task: String,

    /// Queue priority
    #[arg(long, value_enum, default_value = "normal")]
    pub priority: PriorityArg,

    /// Enqueue only; do not attempt to drain the queue
    #[arg(long)]
    pub enqueue_only: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum PriorityArg {
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
        }
    }
}

pub async fn handle(args: RunArgs, state_dir: &StateDir) -> Result<()> {
    state_dir.ensure_exists()?;
    let queue = Queue::open(state_dir.queue_path())?;
    queue.enqueue(&args.task, args.priority.into(), Default::default(), Utc::now())?;
    println!("enqueued {}", args.task);

    if args.enqueue_only {
        return Ok(());
    }

    let mut executor = match Executor::open(
        state_dir.clone(),
        DesktopNotifyAdapter::new(),
        ResourceThresholds::default(),
    ) {
        Ok(executor) => executor,
        Err(clodputer_executor::ExecutorError::Lock(LockError::Held(pid))) => {
            anyhow::bail!("executor already running (pid {pid}); refusing to start a second one");
        }
        Err(e) => return Err(e.into()),
    };

    let outcomes = executor.run_until_idle().await?;
    let all_succeeded = outcomes.iter().all(|o| !matches!(o, RunOutcome::Ran { success: false, .. }));
    for outcome in &outcomes {
        match outcome {
            RunOutcome::Ran { task_name, success } => {
                println!("{task_name}: {}", if *success { "success" } else { "failed" });
            }
            RunOutcome::Skipped { task_name } => println!("{task_name}: skipped"),
            RunOutcome::Deferred { task_name } => println!("{task_name}: deferred"),
            RunOutcome::Idle => {}
        }
    }

    if all_succeeded {
        Ok(())
    } else {
        anyhow::bail!("one or more drained tasks failed")
    }
}
