// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// ── reset_worker ──────────────────────────────────────────────────────

#[tokio::test]
async fn reset_of_unknown_worker_is_a_logical_error() {
    let (engine, _, _) = engine();
    let data = call(&engine, "reset_worker", json!({ "worker_name": "ghost" })).await;
    assert_eq!(data["success"], json!(false));
    assert_eq!(data["error"], json!("Unknown worker: ghost"));
}

#[tokio::test]
async fn reset_abandons_an_executing_task() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;

    let data = call(&engine, "reset_worker", json!({ "worker_name": "w1" })).await;
    assert_eq!(
        data,
        json!({ "success": true, "worker": "w1", "previous_task": "b-1" })
    );
    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Idle);
            assert!(w.current_task.is_none());
            assert_eq!(s.active_count(), 0);
        })
        .await;

    // the abandoned bead may now be retried
    let data = call(&engine, "retry_task", json!({ "bead_id": "b-1" })).await;
    assert_eq!(data["dispatched"], json!(true));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn reset_of_a_pending_worker_drops_the_assignment() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;

    let data = call(&engine, "reset_worker", json!({ "worker_name": "w1" })).await;
    assert_eq!(data["previous_task"], json!("b-1"));
    engine
        .with_state(|s| {
            assert!(s.pending_task("w1").is_none());
            assert_eq!(s.active_count(), 0);
        })
        .await;
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn reset_cancels_a_blocked_poll() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    let poll = spawn_poll(&engine, "w1", 30_000).await;

    let data = call(&engine, "reset_worker", json!({ "worker_name": "w1" })).await;
    assert_eq!(
        data,
        json!({ "success": true, "worker": "w1", "previous_task": null })
    );

    // the suspended RPC completes as cancelled rather than hanging
    let resolved = poll.await.unwrap();
    assert_eq!(resolved, json!({ "task": null, "cancelled": true }));
    assert!(engine.poller_names().await.is_empty());
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn reset_of_an_idle_worker_is_a_noop_success() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    let data = call(&engine, "reset_worker", json!({ "worker_name": "w1" })).await;
    assert_eq!(
        data,
        json!({ "success": true, "worker": "w1", "previous_task": null })
    );
}

#[tokio::test]
async fn reset_drains_queued_work_into_the_freed_worker() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-1").await;

    call(&engine, "reset_worker", json!({ "worker_name": "w1" })).await;

    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.status, WorkerStatus::Pending);
            assert_eq!(w.current_task.as_ref().unwrap(), "b-1");
            assert_eq!(s.queue_len(), 0);
            // b-0 is gone for good
            assert_eq!(s.active_count(), 1);
        })
        .await;
    assert_invariants(&engine).await;
}

// ── retry_task ────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_of_an_active_bead_is_refused() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;

    let data = call(&engine, "retry_task", json!({ "bead_id": "b-1" })).await;
    assert_eq!(
        data,
        json!({
            "dispatched": false,
            "error": "Task still active — use reset_worker first if worker died",
            "bead_id": "b-1"
        })
    );
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn retry_validates_through_the_tracker() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    tracker.reject("b-gone", "Bead b-gone is already closed");

    let data = call(&engine, "retry_task", json!({ "bead_id": "b-gone" })).await;
    assert_eq!(
        data,
        json!({
            "dispatched": false,
            "error": "Bead b-gone is already closed",
            "bead_id": "b-gone"
        })
    );
}

#[tokio::test]
async fn retry_dispatches_like_submit() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;
    call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;

    let data = call(&engine, "retry_task", json!({ "bead_id": "b-1" })).await;
    assert_eq!(
        data,
        json!({ "dispatched": true, "worker": "w1", "bead_id": "b-1" })
    );
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn retry_queues_when_no_worker_is_free() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;

    let data = call(&engine, "retry_task", json!({ "bead_id": "b-9" })).await;
    assert_eq!(
        data,
        json!({ "dispatched": false, "queued": true, "position": 1, "bead_id": "b-9" })
    );
    assert_invariants(&engine).await;
}
