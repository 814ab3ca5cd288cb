// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clodputer-storage: on-disk persistence for the queue, the lockfile, the
//! metrics store, and the structured execution log.
//!
//! Every document here is mutated through write-temp-then-rename
//! ([`atomic::write_json_atomic`]) so a crash mid-write never leaves a
//! partially-written file in place of the prior good state.

mod atomic;
mod lock;
mod logger;
mod metrics_store;
mod queue;

pub use atomic::write_json_atomic;
pub use lock::{LockError, Lockfile};
pub use logger::{LogFollower, LoggerError, StructuredLogger, DEFAULT_MAX_ARCHIVES, DEFAULT_MAX_BYTES};
pub use metrics_store::{MetricsStore, MetricsStoreError};
pub use queue::{FailOutcome, Queue, QueueError};
