// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff math, shared between the queue (which stamps `not_before`)
//! and the executor (which decides whether an attempt is terminal).

use crate::task::BackoffKind;
use std::time::Duration;

/// Compute the delay before retry attempt `attempt` (1-indexed: the first
/// retry after the initial failed attempt is `attempt == 1`).
pub fn compute_backoff(
    kind: BackoffKind,
    attempt: u32,
    initial_delay: Duration,
    max_delay: Duration,
) -> Duration {
    let delay = match kind {
        BackoffKind::Fixed => initial_delay,
        BackoffKind::Exponential => {
            let exponent = attempt.saturating_sub(1).min(31);
            initial_delay.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
        }
    };
    delay.min(max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let d = Duration::from_secs(5);
        for attempt in 1..=5 {
            assert_eq!(
                compute_backoff(BackoffKind::Fixed, attempt, d, Duration::from_secs(100)),
                d
            );
        }
    }

    #[test]
    fn exponential_backoff_doubles() {
        let initial = Duration::from_secs(2);
        let max = Duration::from_secs(1000);
        assert_eq!(compute_backoff(BackoffKind::Exponential, 1, initial, max), Duration::from_secs(2));
        assert_eq!(compute_backoff(BackoffKind::Exponential, 2, initial, max), Duration::from_secs(4));
        assert_eq!(compute_backoff(BackoffKind::Exponential, 3, initial, max), Duration::from_secs(8));
    }

    #[test]
    fn exponential_backoff_caps_at_max_delay() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(10);
        assert_eq!(compute_backoff(BackoffKind::Exponential, 20, initial, max), max);
    }
}
