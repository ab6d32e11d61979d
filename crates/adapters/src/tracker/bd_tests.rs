// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;

#[test]
fn parses_show_output() {
    let info = parse_show_output(r#"{"id":"b-1","status":"open","title":"fix the bug"}"#).unwrap();
    assert_eq!(info.status, "open");
}

#[test]
fn parses_show_output_with_surrounding_whitespace() {
    let info = parse_show_output("\n  {\"status\": \"ready\"}\n").unwrap();
    assert_eq!(info.status, "ready");
}

#[test]
fn rejects_malformed_show_output() {
    assert!(matches!(
        parse_show_output("not json"),
        Err(TrackerError::Json(_))
    ));
}

#[parameterized(
    open = { "open" },
    ready = { "ready" },
    blocked = { "blocked" },
)]
fn submittable_statuses_validate(status: &str) {
    assert_eq!(validate_status("b-1", status), Validation::ok());
}

#[parameterized(
    closed = { "closed" },
    done = { "done" },
    in_progress = { "in_progress" },
)]
fn terminal_or_running_statuses_do_not_validate(status: &str) {
    let v = validate_status("b-1", status);
    assert!(!v.valid);
    assert!(v.error.unwrap().contains("b-1"));
}

#[tokio::test]
async fn missing_binary_surfaces_invocation_error() {
    let tracker = BdCliTracker::with_bin("definitely-not-bd");
    let err = tracker.set_in_progress("b-1").await.unwrap_err();
    assert!(matches!(err, TrackerError::Invocation(_)), "got: {err:?}");
}

#[tokio::test]
async fn failed_show_is_a_validation_outcome_not_an_error() {
    // `false` exits non-zero without output, standing in for `bd show` on
    // an unknown bead.
    let tracker = BdCliTracker::with_bin("false");
    let v = tracker.validate("b-404").await.unwrap();
    assert!(!v.valid);
    assert!(v.error.unwrap().contains("b-404"));
}

#[tokio::test]
async fn successful_update_returns_ok() {
    // `true` ignores its arguments and exits zero.
    let tracker = BdCliTracker::with_bin("true");
    tracker.set_in_progress("b-1").await.unwrap();
    tracker.mark_blocked("b-1", "stuck").await.unwrap();
}
