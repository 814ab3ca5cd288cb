// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer list` — configured tasks, their triggers, schedule/pattern.

use crate::table::{Column, Table};
use anyhow::Result;
use clodputer_core::Trigger;
use clodputer_executor::StateDir;

pub fn handle(state_dir: &StateDir) -> Result<()> {
    let (tasks, errors) = clodputer_executor::load_all_tasks(&state_dir.tasks_dir());

    let mut table = Table::new(vec![
        Column::left("NAME"),
        Column::left("ENABLED"),
        Column::left("TRIGGER"),
        Column::left("SCHEDULE/PATTERN").with_max(60),
    ]);

    for task in &tasks {
        let (trigger, detail) = match &task.trigger {
            Trigger::Manual => ("manual".to_string(), "-".to_string()),
            Trigger::Cron { expression, timezone } => (
                "cron".to_string(),
                match timezone {
                    Some(tz) => format!("{expression} ({tz})"),
                    None => expression.clone(),
                },
            ),
            Trigger::FileWatch { path, pattern, .. } => {
                ("file_watch".to_string(), format!("{path}/{pattern}"))
            }
        };
        table.row(vec![
            task.name.clone(),
            if task.enabled { "yes".to_string() } else { "no".to_string() },
            trigger,
            detail,
        ]);
    }

    let mut out = std::io::stdout();
    table.render(&mut out);
    if tasks.is_empty() {
        println!("no task definitions found in {}", state_dir.tasks_dir().display());
    }

    for (path, err) in &errors {
        eprintln!("warning: {}: {err}", path.display());
    }

    Ok(())
}
