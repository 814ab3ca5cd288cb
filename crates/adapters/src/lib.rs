// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: spawning the LLM CLI, process-tree cleanup,
//! the cron `crontab` shell-out, filesystem watching, and desktop
//! notifications.

pub mod cron_shell;
mod env;
pub mod notify;
pub mod process_tree;
pub mod subprocess;
pub mod watcher;

pub use env::watcher_poll_ms;
pub use notify::{DesktopNotifyAdapter, NoOpNotifyAdapter, NotifyAdapter, NotifyError};
pub use process_tree::{cleanup, CleanupReport};
pub use subprocess::{run_with_timeout, spawn_with_timeout, SpawnError, SpawnOutcome};
pub use watcher::{Debouncer, FsWatcher, TriggeredRun, WatchRegistration, WatcherError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
