// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! clodputer - a task-queue/executor/cron/watcher automation runtime that
//! drives an external LLM CLI.

mod color;
mod commands;
mod output;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clodputer_executor::StateDir;
use commands::{doctor, install, list, logs, queue, run, schedule_preview, status, watch};

#[derive(Parser)]
#[command(
    name = "clodputer",
    version,
    about = "Automates recurring work by driving an LLM CLI from a task queue"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a task and (unless --enqueue-only) drain the queue
    Run(run::RunArgs),
    /// List configured tasks, their triggers, and schedule/pattern
    List,
    /// Show the running item, queued items, recent executions, and today's counts
    Status,
    /// Detailed queue dump, or clear queued items
    Queue(queue::QueueArgs),
    /// View the structured execution log
    Logs(logs::LogsArgs),
    /// Install the managed crontab block for cron-triggered tasks
    Install(install::InstallArgs),
    /// Remove the managed crontab block
    Uninstall,
    /// Manage the filesystem-watch daemon
    Watch(watch::WatchArgs),
    /// Run diagnostics over the state directory
    Doctor,
    /// Show the next N fire times for a cron-triggered task
    SchedulePreview(schedule_preview::SchedulePreviewArgs),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let code = match run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = std::env::var("CLODPUTER_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::from_default_env());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn run_cli() -> Result<i32> {
    let cli = Cli::parse();
    let state_dir = StateDir::resolve();

    match cli.command {
        Commands::Run(args) => {
            run::handle(args, &state_dir).await?;
            Ok(0)
        }
        Commands::List => {
            list::handle(&state_dir)?;
            Ok(0)
        }
        Commands::Status => {
            status::handle(&state_dir)?;
            Ok(0)
        }
        Commands::Queue(args) => {
            queue::handle(args, &state_dir)?;
            Ok(0)
        }
        Commands::Logs(args) => {
            logs::handle(args, &state_dir)?;
            Ok(0)
        }
        Commands::Install(args) => {
            install::install(args, &state_dir).await?;
            Ok(0)
        }
        Commands::Uninstall => {
            install::uninstall(&state_dir).await?;
            Ok(0)
        }
        Commands::Watch(args) => {
            watch::handle(args, &state_dir)?;
            Ok(0)
        }
        Commands::Doctor => {
            let healthy = doctor::handle(&state_dir).await?;
            Ok(if healthy { 0 } else { 1 })
        }
        Commands::SchedulePreview(args) => {
            schedule_preview::handle(args, &state_dir)?;
            Ok(0)
        }
    }
}
