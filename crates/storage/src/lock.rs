// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PID lockfile that enforces at-most-one executor per state directory
//! (§4.4, §5).
//!
//! This is a cooperative protocol, not an OS advisory lock: the file's
//! content is the decimal PID of its owner, and liveness is checked with a
//! process-table scan rather than relying on the lock being released when
//! its holder dies (a SIGKILL'd process leaves no trace for `flock` to
//! notice, but its PID does disappear from the process table).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, System};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lockfile content is not a valid pid")]
    Malformed,
    #[error("another executor is already running (pid {0})")]
    Held(u32),
}

/// A held process lockfile. Removed on drop iff its content still matches
/// this process's PID (another process may have since stolen a stale
/// lock out from under us, in which case we must not delete theirs).
pub struct Lockfile {
    path: PathBuf,
    pid: u32,
}

impl Lockfile {
    /// Acquire the lock at `path`, following the protocol in §4.4:
    /// attempt exclusive creation; if the file already exists, read the
    /// PID and check liveness; remove and retry once if stale; otherwise
    /// fail with [`LockError::Held`].
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match create_exclusive(&path) {
            Ok(()) => Ok(Self {
                path,
                pid: std::process::id(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let held_pid = read_pid(&path)?;
                if is_live(held_pid) {
                    return Err(LockError::Held(held_pid));
                }
                warn!(pid = held_pid, path = %path.display(), "removing stale lockfile");
                fs::remove_file(&path)?;
                create_exclusive(&path)?;
                Ok(Self {
                    path,
                    pid: std::process::id(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release the lock iff we still own it. Idempotent.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if read_pid(&self.path).ok() == Some(self.pid) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn create_exclusive(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{}", std::process::id())?;
    file.sync_all()?;
    Ok(())
}

fn read_pid(path: &Path) -> Result<u32, LockError> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    contents.trim().parse().map_err(|_| LockError::Malformed)
}

fn is_live(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}
