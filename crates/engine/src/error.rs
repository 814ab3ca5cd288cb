// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the executor runtime.

use clodputer_storage::{LockError, LoggerError, MetricsStoreError, QueueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("metrics store error: {0}")]
    Metrics(#[from] MetricsStoreError),
    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
