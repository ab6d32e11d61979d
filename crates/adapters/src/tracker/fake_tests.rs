// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn validates_everything_by_default() {
    let tracker = FakeTracker::new();
    let v = tracker.validate("b-1").await.unwrap();
    assert!(v.valid);
}

#[tokio::test]
async fn rejects_configured_beads() {
    let tracker = FakeTracker::new();
    tracker.reject("b-bad", "not found");
    let v = tracker.validate("b-bad").await.unwrap();
    assert!(!v.valid);
    assert_eq!(v.error.as_deref(), Some("not found"));

    // others unaffected
    assert!(tracker.validate("b-ok").await.unwrap().valid);
}

#[tokio::test]
async fn records_calls_in_order() {
    let tracker = FakeTracker::new();
    tracker.validate("b-1").await.unwrap();
    tracker.set_in_progress("b-1").await.unwrap();
    tracker.mark_blocked("b-1", "stuck on review").await.unwrap();

    assert_eq!(
        tracker.calls(),
        vec![
            TrackerCall::Validate("b-1".to_string()),
            TrackerCall::SetInProgress("b-1".to_string()),
            TrackerCall::MarkBlocked("b-1".to_string(), "stuck on review".to_string()),
        ]
    );
}

#[tokio::test]
async fn scripted_failures_surface_as_command_errors() {
    let tracker = FakeTracker::new();
    tracker.fail_set_in_progress("bd exploded");
    let err = tracker.set_in_progress("b-1").await.unwrap_err();
    assert!(err.to_string().contains("bd exploded"));

    tracker.fail_mark_blocked("no such status");
    let err = tracker.mark_blocked("b-1", "reason").await.unwrap_err();
    assert!(err.to_string().contains("no such status"));
}
