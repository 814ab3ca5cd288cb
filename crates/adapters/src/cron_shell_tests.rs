// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn five_field_expression_is_normalized_with_seconds() {
    assert_eq!(normalize("0 2 * * *"), "0 0 2 * * *");
}

#[test]
fn six_field_expression_is_left_alone() {
    assert_eq!(normalize("30 0 2 * * *"), "30 0 2 * * *");
}

#[test]
fn named_macros_expand() {
    assert_eq!(normalize("@daily"), "0 0 0 * * *");
    assert_eq!(normalize("@workdays"), "0 0 0 * * 1-5");
    assert_eq!(normalize("@weekends"), "0 0 0 * * 0,6");
}

#[test]
fn valid_expression_parses() {
    assert!(validate_expression("0 2 * * *").is_ok());
    assert!(validate_expression("@hourly").is_ok());
}

#[test]
fn invalid_expression_is_rejected_with_reason() {
    let err = validate_expression("not a cron expression").unwrap_err();
    assert!(matches!(err, CronError::InvalidExpression { .. }));
}

#[test]
fn next_runs_returns_requested_count_in_order() {
    let runs = next_runs("0 0 * * * *", None, 3).unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs[0] < runs[1]);
    assert!(runs[1] < runs[2]);
}

#[test]
fn next_runs_honors_named_timezone() {
    let runs = next_runs("0 0 12 * * *", Some("America/New_York"), 1).unwrap();
    assert_eq!(runs.len(), 1);
}

#[test]
fn unknown_timezone_is_rejected() {
    let err = next_runs("@daily", Some("Nowhere/Nope"), 1).unwrap_err();
    assert!(matches!(err, CronError::InvalidTimezone(_)));
}

fn sample_entries() -> Vec<CronEntry> {
    vec![CronEntry {
        task_name: "greet".to_string(),
        expression: "0 2 * * *".to_string(),
        timezone: Some("UTC".to_string()),
        executor_path: "/usr/local/bin/clodputer".to_string(),
        cron_log_path: "/home/user/.clodputer/cron.log".to_string(),
    }]
}

#[test]
fn strip_managed_block_removes_only_the_sentinel_region() {
    let crontab = format!(
        "0 1 * * * /some/other/job\n{}\nstale line\n{}\n",
        MANAGED_BLOCK_START, MANAGED_BLOCK_END
    );
    let stripped = strip_managed_block(&crontab);
    assert!(stripped.contains("/some/other/job"));
    assert!(!stripped.contains("stale line"));
}

#[test]
fn preview_appends_a_fresh_managed_block() {
    let diff = preview(&sample_entries(), "0 1 * * * /existing/job\n");
    assert!(diff.after.contains(MANAGED_BLOCK_START));
    assert!(diff.after.contains(MANAGED_BLOCK_END));
    assert!(diff.after.contains("greet"));
    assert!(diff.after.contains("/existing/job"));
}

#[test]
fn preview_replaces_a_prior_managed_block_rather_than_duplicating_it() {
    let existing = format!(
        "{}\nold entry\n{}\n",
        MANAGED_BLOCK_START, MANAGED_BLOCK_END
    );
    let diff = preview(&sample_entries(), &existing);
    assert!(!diff.after.contains("old entry"));
    assert_eq!(diff.after.matches(MANAGED_BLOCK_START).count(), 1);
}

#[test]
fn rendered_entry_sets_tz_and_redirects_output() {
    let entry = &sample_entries()[0];
    let rendered = entry.render();
    assert!(rendered.starts_with("0 0 2 * * *"));
    assert!(rendered.contains("TZ=UTC"));
    assert!(rendered.contains(">> /home/user/.clodputer/cron.log 2>&1"));
}
