// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use beadbus_adapters::TrackerCall;

use super::*;

// ── ack_task ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ack_moves_worker_to_executing() {
    let (engine, tracker, clock) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    clock.set_epoch_ms(2_000_000);

    let data = ack(&engine, "w1", "b-1").await;
    assert_eq!(
        data,
        json!({ "success": true, "worker": "w1", "bead_id": "b-1" })
    );
    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Executing);
            assert_eq!(w.current_task.as_ref().unwrap(), "b-1");
            assert_eq!(w.task_started_at, Some(2_000_000));
            assert!(s.pending_task("w1").is_none());
        })
        .await;
    assert!(tracker
        .calls()
        .contains(&TrackerCall::SetInProgress("b-1".to_string())));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn ack_with_wrong_bead_leaves_state_untouched() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-ok").await;

    let data = ack(&engine, "w1", "b-wrong").await;
    assert_eq!(
        data,
        json!({ "success": false, "error": "Task mismatch: expected b-ok, got b-wrong" })
    );
    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Pending);
            assert_eq!(w.current_task.as_ref().unwrap(), "b-ok");
            assert!(s.pending_task("w1").is_some());
        })
        .await;
    // the tracker was never asked to transition anything
    assert!(!tracker
        .calls()
        .iter()
        .any(|c| matches!(c, TrackerCall::SetInProgress(_))));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn ack_without_pending_task_is_a_logical_error() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    let data = ack(&engine, "w1", "b-1").await;
    assert_eq!(data["success"], json!(false));
    assert_eq!(data["error"], json!("No pending task for worker w1"));
}

#[tokio::test]
async fn ack_rolls_back_when_the_tracker_fails() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    tracker.fail_set_in_progress("tracker down");

    let data = ack(&engine, "w1", "b-1").await;
    assert_eq!(data["success"], json!(false));
    assert!(
        data["error"].as_str().unwrap().contains("tracker down"),
        "got: {data}"
    );

    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Idle);
            assert!(w.current_task.is_none());
            assert!(w.task_started_at.is_none());
            assert!(s.pending_task("w1").is_none());
            assert_eq!(s.active_count(), 0);
        })
        .await;

    // the bead can be submitted again
    tracker.clear_failures();
    let data = submit(&engine, "b-1").await;
    assert_eq!(data["dispatched"], json!(true));
    assert_invariants(&engine).await;
}

// ── worker_done ───────────────────────────────────────────────────────

#[tokio::test]
async fn done_returns_worker_to_idle() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;

    let data = call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;
    assert_eq!(
        data,
        json!({ "success": true, "bead_id": "b-1", "worker": "w1" })
    );
    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Idle);
            assert!(w.current_task.is_none());
            assert_eq!(s.active_count(), 0);
        })
        .await;
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn done_for_unheld_bead_warns_and_succeeds() {
    let (engine, _, _) = engine();
    let data = call(&engine, "worker_done", json!({ "bead_id": "b-??" })).await;
    assert_eq!(
        data,
        json!({ "success": true, "bead_id": "b-??", "warning": "Worker not found" })
    );
}

#[tokio::test]
async fn done_is_tolerant_of_redelivery() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;

    let first = call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;
    assert_eq!(first["worker"], json!("w1"));
    let second = call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;
    assert_eq!(second["warning"], json!("Worker not found"));
}

#[tokio::test]
async fn done_on_an_unacked_pending_worker_releases_it() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;

    let data = call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;
    assert_eq!(data["worker"], json!("w1"));
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn after_done_either_queue_is_empty_or_no_worker_is_available() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-1").await;
    submit(&engine, "b-2").await;

    call(&engine, "worker_done", json!({ "bead_id": "b-0" })).await;

    engine
        .with_state(|s| {
            let any_available = s.workers().any(|w| w.status.is_available());
            assert!(s.queue_len() == 0 || !any_available);
        })
        .await;
    assert_invariants(&engine).await;
}

// ── task_failed ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_blocks_the_bead_and_frees_the_worker() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;

    let data = call(
        &engine,
        "task_failed",
        json!({ "bead_id": "b-1", "reason": "tests are red" }),
    )
    .await;
    assert_eq!(
        data,
        json!({
            "success": true,
            "bead_id": "b-1",
            "status": "blocked",
            "reason": "tests are red"
        })
    );
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert!(tracker.calls().contains(&TrackerCall::MarkBlocked(
        "b-1".to_string(),
        "tests are red".to_string()
    )));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn failed_leaves_state_alone_when_the_tracker_fails() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;
    tracker.fail_mark_blocked("no such transition");

    let data = call(
        &engine,
        "task_failed",
        json!({ "bead_id": "b-1", "reason": "r" }),
    )
    .await;
    assert_eq!(data["success"], json!(false));
    assert!(data["error"].as_str().unwrap().contains("no such transition"));

    // worker still owns the bead
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Executing);
    engine.with_state(|s| assert_eq!(s.active_count(), 1)).await;
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn failed_removes_a_queued_bead() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-1").await;
    assert_eq!(
        engine.with_state(|s| s.queue_len()).await,
        1
    );

    let data = call(
        &engine,
        "task_failed",
        json!({ "bead_id": "b-1", "reason": "withdrawn" }),
    )
    .await;
    assert_eq!(data["success"], json!(true));
    engine
        .with_state(|s| {
            assert_eq!(s.queue_len(), 0);
            assert_eq!(s.active_count(), 1); // only b-0 remains
        })
        .await;
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn failed_drains_the_queue_into_the_freed_worker() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-1").await;

    call(
        &engine,
        "task_failed",
        json!({ "bead_id": "b-0", "reason": "wedged" }),
    )
    .await;

    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Pending);
            assert_eq!(w.current_task.as_ref().unwrap(), "b-1");
            assert_eq!(s.queue_len(), 0);
        })
        .await;
    assert_invariants(&engine).await;
}
