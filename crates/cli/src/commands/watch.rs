// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer watch [--daemon|--stop|--status]` — manage the filesystem
//! watch daemon (§4.8).

use anyhow::Result;
use clap::Args;
use clodputer_executor::{watcher, StateDir, WatchStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Fork into the background and run as a daemon (foreground by default)
    #[arg(long)]
    pub daemon: bool,

    /// Stop a running watcher daemon
    #[arg(long)]
    pub stop: bool,

    /// Report whether a watcher daemon is running
    #[arg(long)]
    pub status: bool,
}

pub fn handle(args: WatchArgs, state_dir: &StateDir) -> Result<()> {
    if args.stop {
        watcher::stop(state_dir)?;
        println!("watcher daemon stopped");
        return Ok(());
    }

    if args.status {
        match watcher::status(state_dir) {
            WatchStatus::Running { pid } => println!("running (pid {pid})"),
            WatchStatus::Stopped => println!("stopped"),
        }
        return Ok(());
    }

    if args.daemon {
        return start_daemon(state_dir);
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_handler = stop_flag.clone();
    ctrlc_once(move || stop_flag_handler.store(true, Ordering::SeqCst));

    watcher::run(state_dir, move || stop_flag.load(Ordering::SeqCst))?;
    Ok(())
}

/// Re-exec this binary as a detached foreground watcher, with its stdio
/// redirected to the watcher log, and return once it's spawned — the
/// caller's shell gets its prompt back instead of blocking on `run`.
fn start_daemon(state_dir: &StateDir) -> Result<()> {
    if let WatchStatus::Running { pid } = watcher::status(state_dir) {
        anyhow::bail!("a watcher daemon is already running (pid {pid})");
    }

    let exe = std::env::current_exe()?;
    let log_path = state_dir.watcher_log_path();
    let stdout = std::fs::OpenOptions::new().create(true).append(true).open(&log_path)?;
    let stderr = stdout.try_clone()?;

    let child = std::process::Command::new(exe)
        .arg("watch")
        .env("CLODPUTER_HOME", state_dir.root())
        .stdin(std::process::Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()?;

    println!("watcher daemon started (pid {}), logging to {}", child.id(), log_path.display());
    Ok(())
}

/// Install a one-shot SIGINT handler without pulling in a signal crate
/// beyond what's already in the dependency graph.
fn ctrlc_once(on_signal: impl Fn() + Send + 'static) {
    let handled = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && !handled.swap(true, Ordering::SeqCst) {
            on_signal();
        }
    });
}
