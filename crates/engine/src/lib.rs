// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The executor runtime: task config loading, the single-flight queue
//! runner, the cron installer, the filesystem-watch daemon, and
//! diagnostics — everything `clodputer-cli` drives.

pub mod config;
pub mod cron;
pub mod doctor;
pub mod env_config;
pub mod error;
pub mod executor;
pub mod paths;
pub mod watcher;

pub use config::{load as load_task, load_all as load_all_tasks, ConfigError};
pub use doctor::{run_checks, Check, CheckStatus};
pub use env_config::EnvConfig;
pub use error::ExecutorError;
pub use executor::{Executor, ResourceThresholds, RunOutcome};
pub use paths::StateDir;
pub use watcher::{WatchDaemonError, WatchStatus};
