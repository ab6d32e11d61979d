// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn empty_engine_reports_empty_snapshot() {
    let (engine, _, _) = engine();
    let data = call(&engine, "get_status", json!({})).await;
    assert_eq!(
        data,
        json!({
            "workers": [],
            "queued_tasks": 0,
            "queue": [],
            "polling_workers": 0,
            "pending_workers": 0
        })
    );
}

#[tokio::test]
async fn idle_worker_snapshot_after_a_full_cycle() {
    let (engine, _, clock) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;
    call(&engine, "worker_done", json!({ "bead_id": "b-1" })).await;

    clock.advance(Duration::from_secs(5));
    let data = call(&engine, "get_status", json!({})).await;
    assert_eq!(
        data,
        json!({
            "workers": [{
                "name": "w1",
                "status": "idle",
                "current_task": null,
                "idle_seconds": 5,
                "pending_task": null
            }],
            "queued_tasks": 0,
            "queue": [],
            "polling_workers": 0,
            "pending_workers": 0
        })
    );
}

#[tokio::test]
async fn executing_workers_have_null_idle_seconds() {
    let (engine, _, clock) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;
    ack(&engine, "w1", "b-1").await;
    clock.advance(Duration::from_secs(30));

    let data = call(&engine, "get_status", json!({})).await;
    let worker = &data["workers"][0];
    assert_eq!(worker["status"], json!("executing"));
    assert_eq!(worker["idle_seconds"], json!(null));
    assert_eq!(worker["current_task"], json!("b-1"));
    assert_eq!(worker["pending_task"], json!(null));
}

#[tokio::test]
async fn pending_worker_shows_its_unacked_bead() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-1").await;

    let data = call(&engine, "get_status", json!({})).await;
    let worker = &data["workers"][0];
    assert_eq!(worker["status"], json!("pending"));
    assert_eq!(worker["current_task"], json!("b-1"));
    assert_eq!(worker["pending_task"], json!("b-1"));
    assert_eq!(data["pending_workers"], json!(1));
}

#[tokio::test]
async fn counts_pollers_and_queue_in_order() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    register(&engine, "w2").await;
    submit(&engine, "b-0").await; // w1 pending
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-x").await; // w2 pending
    ack(&engine, "w2", "b-x").await;
    submit(&engine, "b-1").await;
    submit(&engine, "b-2").await;

    register(&engine, "w3").await;
    let _poll = spawn_poll(&engine, "w3", 30_000).await;
    // w3 polls while two beads wait: they were queued before w3 existed
    // and are only handed out by a drain or a new submission
    let data = call(&engine, "get_status", json!({})).await;
    assert_eq!(data["queued_tasks"], json!(2));
    assert_eq!(data["queue"], json!(["b-1", "b-2"]));
    assert_eq!(data["polling_workers"], json!(1));
    assert_eq!(data["pending_workers"], json!(0));

    // completing b-0 drains the whole queue: the polling w3 takes the
    // head, the freed w1 takes the rest
    call(&engine, "worker_done", json!({ "bead_id": "b-0" })).await;
    let data = call(&engine, "get_status", json!({})).await;
    assert_eq!(data["queue"], json!([]));
    assert_eq!(data["queued_tasks"], json!(0));
    assert_eq!(data["polling_workers"], json!(0));
    assert_eq!(data["pending_workers"], json!(2));

    engine
        .with_state(|s| {
            let w3 = s.worker("w3").unwrap();
            assert_eq!(w3.current_task.as_ref().unwrap(), "b-1");
            let w1 = s.worker("w1").unwrap();
            assert_eq!(w1.current_task.as_ref().unwrap(), "b-2");
        })
        .await;
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn get_status_ignores_params() {
    let (engine, _, _) = engine();
    let data = call(&engine, "get_status", json!({ "anything": 1 })).await;
    assert_eq!(data["workers"], json!([]));
}
