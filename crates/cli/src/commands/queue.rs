// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer queue [--clear]` — detailed queue dump; `--clear` removes
//! queued items (never the running one, §5 "Cancellation & timeout").

use crate::table::{Column, Table};
use anyhow::Result;
use clap::Args;
use clodputer_executor::StateDir;
use clodputer_storage::Queue;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Remove all queued (not running) items
    #[arg(long)]
    pub clear: bool,
}

pub fn handle(args: QueueArgs, state_dir: &StateDir) -> Result<()> {
    let queue = Queue::open(state_dir.queue_path())?;

    if args.clear {
        let removed = queue.clear()?;
        println!("removed {removed} queued item(s)");
        return Ok(());
    }

    let snapshot = queue.snapshot();

    println!("running: {}", snapshot.running.as_ref().map(|i| i.name.as_str()).unwrap_or("(none)"));
    println!();

    let mut table = Table::new(vec![
        Column::left("ID"),
        Column::left("NAME"),
        Column::left("PRIORITY"),
        Column::right("ATTEMPT"),
        Column::left("ENQUEUED_AT"),
        Column::left("NOT_BEFORE"),
    ]);
    for item in &snapshot.queued {
        table.row(vec![
            item.id.to_string(),
            item.name.clone(),
            format!("{:?}", item.priority),
            item.attempt_count.to_string(),
            item.enqueued_at.to_rfc3339(),
            item.not_before.to_rfc3339(),
        ]);
    }
    let mut out = std::io::stdout();
    table.render(&mut out);
    if snapshot.queued.is_empty() {
        println!("(queue empty)");
    }

    Ok(())
}
