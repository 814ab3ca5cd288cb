// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers shared by the LLM CLI spawn path and the
//! cron/crontab shell-outs.

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};

/// Default timeout for `crontab -l` / `crontab -` shell-outs.
pub const CRONTAB_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a short-lived subprocess to completion with a timeout, capturing
/// combined output. Used for commands that are not the long-running LLM
/// CLI invocation (e.g. `crontab`).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Outcome of spawning and awaiting a long-running child within a budget.
pub enum SpawnOutcome {
    /// The child exited (successfully or not) within the timeout.
    Completed(Output),
    /// The timeout elapsed before the child exited; `pid` is still alive
    /// (or exiting) and must be handed to the cleanup routine.
    TimedOut { pid: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn child process: {0}")]
    Spawn(std::io::Error),
    #[error("spawned child process had no pid")]
    NoPid,
    #[error("error waiting on child process: {0}")]
    Wait(std::io::Error),
}

/// Spawn `cmd` with piped stdout/stderr and wait up to `timeout` for it to
/// exit. On timeout, the child is left running and its pid is returned so
/// the caller can run the cleanup algorithm (§4.5) against it; this
/// function does not kill anything itself.
pub async fn spawn_with_timeout(mut cmd: Command, timeout: Duration) -> Result<SpawnOutcome, SpawnError> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let child: Child = cmd.spawn().map_err(SpawnError::Spawn)?;
    let pid = child.id().ok_or(SpawnError::NoPid)?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(SpawnOutcome::Completed(output)),
        Ok(Err(e)) => Err(SpawnError::Wait(e)),
        Err(_elapsed) => Ok(SpawnOutcome::TimedOut { pid }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
