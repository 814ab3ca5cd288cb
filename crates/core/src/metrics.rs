// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task metrics record shape (§3, §4.3).
//!
//! EWMA alpha is fixed at 0.3 per the Open Question resolution recorded in
//! DESIGN.md — left non-configurable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smoothing factor for the exponentially-weighted moving average duration.
pub const EWMA_ALPHA: f64 = 0.3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_status: Option<String>,
    pub last_duration: Option<f64>,
    pub avg_duration: Option<f64>,
    pub ewma_duration: Option<f64>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl MetricsRecord {
    /// Fold in the outcome of one run.
    pub fn record_outcome(&mut self, status: &str, duration_seconds: f64, now: DateTime<Utc>) {
        if status == "success" {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.last_status = Some(status.to_string());
        self.last_duration = Some(duration_seconds);
        self.last_run_at = Some(now);

        let total_runs = self.success_count + self.failure_count;
        self.avg_duration = Some(match self.avg_duration {
            Some(prev_avg) => {
                let prev_total = total_runs.saturating_sub(1) as f64;
                (prev_avg * prev_total + duration_seconds) / total_runs as f64
            }
            None => duration_seconds,
        });

        self.ewma_duration = Some(match self.ewma_duration {
            Some(prev_ewma) => EWMA_ALPHA * duration_seconds + (1.0 - EWMA_ALPHA) * prev_ewma,
            None => duration_seconds,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_outcome_seeds_all_averages() {
        let mut record = MetricsRecord::default();
        record.record_outcome("success", 10.0, Utc::now());
        assert_eq!(record.success_count, 1);
        assert_eq!(record.avg_duration, Some(10.0));
        assert_eq!(record.ewma_duration, Some(10.0));
    }

    #[test]
    fn ewma_weights_recent_runs_more_heavily() {
        let mut record = MetricsRecord::default();
        record.record_outcome("success", 10.0, Utc::now());
        record.record_outcome("success", 20.0, Utc::now());
        // 0.3 * 20 + 0.7 * 10 = 13.0
        assert!((record.ewma_duration.unwrap() - 13.0).abs() < 1e-9);
        // simple average is (10 + 20) / 2 = 15.0
        assert!((record.avg_duration.unwrap() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn failure_increments_failure_count_not_success() {
        let mut record = MetricsRecord::default();
        record.record_outcome("failure", 5.0, Utc::now());
        assert_eq!(record.failure_count, 1);
        assert_eq!(record.success_count, 0);
    }
}
