// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn rejects_unknown_worker() {
    let (engine, _, _) = engine();
    let data = call(&engine, "poll_task", json!({ "name": "ghost" })).await;
    assert_eq!(data["success"], json!(false));
    assert_eq!(data["error"], json!("Unknown worker: ghost"));
}

#[tokio::test]
async fn rejects_invalid_worker_name() {
    let (engine, _, _) = engine();
    let data = call(&engine, "poll_task", json!({ "name": "no spaces" })).await;
    assert_eq!(data["success"], json!(false));
}

#[tokio::test]
async fn times_out_and_returns_worker_to_idle() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    let data = call(&engine, "poll_task", json!({ "name": "w1", "timeout_ms": 60 })).await;
    assert_eq!(data, json!({ "task": null, "timeout": true }));
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert!(engine.poller_names().await.is_empty());
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn returns_pending_task_immediately_without_touching_state() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);

    let data = call(&engine, "poll_task", json!({ "name": "w1" })).await;
    assert_eq!(data["task"]["bead_id"], json!("b-1"));

    // not consumed: still pending until acked, and pollable again
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);
    let again = call(&engine, "poll_task", json!({ "name": "w1" })).await;
    assert_eq!(again["task"]["bead_id"], json!("b-1"));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn second_concurrent_poll_is_rejected() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    let first = spawn_poll(&engine, "w1", 5_000).await;
    let data = call(&engine, "poll_task", json!({ "name": "w1" })).await;
    assert_eq!(data["success"], json!(false));
    assert_eq!(data["error"], json!("Worker w1 is already polling"));

    // the original poll is still live and resolvable
    submit(&engine, "b-1").await;
    let resolved = first.await.unwrap();
    assert_eq!(resolved["task"]["bead_id"], json!("b-1"));
}

#[tokio::test]
async fn executing_worker_cannot_poll() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;

    let data = call(&engine, "poll_task", json!({ "name": "w1" })).await;
    assert_eq!(data["success"], json!(false));
    assert!(data["error"].as_str().unwrap().contains("executing"));
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Executing);
}

#[tokio::test]
async fn submit_resolves_a_blocked_poll() {
    let (engine, _, clock) = engine();
    clock.set_epoch_ms(7_000);
    register(&engine, "w1").await;

    let poll = spawn_poll(&engine, "w1", 5_000).await;
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Polling);

    let submitted = submit(&engine, "b-1").await;
    assert_eq!(
        submitted,
        json!({ "dispatched": true, "worker": "w1", "bead_id": "b-1" })
    );

    let resolved = poll.await.unwrap();
    assert_eq!(
        resolved,
        json!({ "task": { "bead_id": "b-1", "assigned_at": 7_000 } })
    );

    // the dispatch mutated state before signalling the resolver
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);
    assert!(engine.poller_names().await.is_empty());
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn poll_timer_does_not_fire_after_dispatch() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    let poll = spawn_poll(&engine, "w1", 80).await;
    submit(&engine, "b-1").await;
    let resolved = poll.await.unwrap();
    assert_eq!(resolved["task"]["bead_id"], json!("b-1"));

    // past the original deadline the worker must still be pending
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn cancel_pollers_resolves_polls_as_cancelled() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    let poll = spawn_poll(&engine, "w1", 5_000).await;
    engine.cancel_pollers().await;

    let resolved = poll.await.unwrap();
    assert_eq!(resolved, json!({ "task": null, "cancelled": true }));
    assert!(engine.poller_names().await.is_empty());
}

#[tokio::test]
async fn default_timeout_is_applied_when_omitted() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    // no timeout_ms: the poll blocks on the 30s default rather than
    // returning immediately
    let spawned = Arc::clone(&engine);
    let poll = tokio::spawn(async move {
        spawned
            .handle("poll_task", json!({ "name": "w1" }))
            .await
            .unwrap()
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Polling);

    submit(&engine, "b-1").await;
    let resolved = poll.await.unwrap();
    assert_eq!(resolved["task"]["bead_id"], json!("b-1"));
}
