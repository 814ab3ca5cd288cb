// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Watcher daemon's fallback poll interval when no `notify` event arrives
/// (default: 5000ms).
pub fn watcher_poll_ms() -> Duration {
    parse_duration_ms("CLODPUTER_WATCHER_POLL_MS").unwrap_or(Duration::from_secs(5))
}
