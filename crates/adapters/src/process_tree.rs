// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-tree cleanup after a task's LLM CLI invocation exits, times out,
//! or is cancelled (§4.5).
//!
//! Every descendant of the spawned process is snapshotted before any
//! signal is sent, because a process that re-parents mid-sweep would
//! otherwise slip past a live traversal. A second, independent scan for
//! externally-namespaced tool processes (the `mcp__` prefix convention)
//! catches descendants that escaped the tree before the snapshot.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::warn;

/// The prefix convention for externally-namespaced tool processes, used by
/// the orphan-sweep safety net.
pub const EXTERNAL_TOOL_PROCESS_PREFIX: &str = "mcp__";

const GRACE_PERIOD: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub terminated: Vec<u32>,
    pub killed: Vec<u32>,
    pub orphans_swept: Vec<u32>,
}

/// Terminate `root` and its full descendant tree, then sweep for any
/// externally-namespaced tool process not accounted for above.
pub fn cleanup(root: u32) -> CleanupReport {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let tree = descendant_tree(&system, root);
    let mut terminated = Vec::new();
    for &pid in &tree {
        if send_signal(pid, Signal::SIGTERM) {
            terminated.push(pid);
        }
    }

    let mut killed = Vec::new();
    let deadline = Instant::now() + GRACE_PERIOD;
    let mut remaining: BTreeSet<u32> = tree.iter().copied().collect();
    while Instant::now() < deadline && !remaining.is_empty() {
        system.refresh_processes(ProcessesToUpdate::All, true);
        remaining.retain(|&pid| system.process(Pid::from_u32(pid)).is_some());
        if remaining.is_empty() {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    for pid in remaining {
        if send_signal(pid, Signal::SIGKILL) {
            killed.push(pid);
        }
    }

    let mut accounted_for: BTreeSet<u32> = tree;
    accounted_for.extend(killed.iter().copied());
    let orphans_swept = sweep_orphans(&accounted_for);

    for pid in &killed {
        warn!(pid, "force-killed process that outlived graceful termination");
    }
    for pid in &orphans_swept {
        warn!(pid, "force-killed orphaned external-tool process");
    }

    CleanupReport {
        terminated,
        killed,
        orphans_swept,
    }
}

/// Snapshot every descendant of `root` (not including `root` itself is
/// excluded from the caller's perspective, but the root PID is included
/// here since it must be signaled too).
fn descendant_tree(system: &System, root: u32) -> Vec<u32> {
    let mut tree = vec![root];
    let mut frontier = vec![root];
    while let Some(parent_pid) = frontier.pop() {
        for (pid, process) in system.processes() {
            if process.parent().map(|p| p.as_u32()) == Some(parent_pid) {
                let pid = pid.as_u32();
                if !tree.contains(&pid) {
                    tree.push(pid);
                    frontier.push(pid);
                }
            }
        }
    }
    tree
}

/// Force-kill any process whose executable name matches the external-tool
/// prefix convention and isn't already accounted for.
fn sweep_orphans(accounted_for: &BTreeSet<u32>) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut swept = Vec::new();
    for (pid, process) in system.processes() {
        let pid = pid.as_u32();
        if accounted_for.contains(&pid) {
            continue;
        }
        let name = process.name().to_string_lossy();
        if name.starts_with(EXTERNAL_TOOL_PROCESS_PREFIX) && send_signal(pid, Signal::SIGKILL) {
            swept.push(pid);
        }
    }
    swept
}

/// Send `signal` to `pid`, swallowing per-process errors (already gone,
/// permission denied) per §4.5's "errors are swallowed per-process"
/// requirement.
fn send_signal(pid: u32, sig: Signal) -> bool {
    match signal::kill(NixPid::from_raw(pid as i32), sig) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(e) => {
            warn!(pid, signal = ?sig, error = %e, "failed to signal process");
            false
        }
    }
}

#[cfg(test)]
#[path = "process_tree_tests.rs"]
mod tests;
