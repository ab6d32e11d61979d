// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use beadbus_adapters::TrackerCall;

use super::*;

#[tokio::test]
async fn dispatches_to_an_idle_worker() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;

    let data = submit(&engine, "b-1").await;
    assert_eq!(
        data,
        json!({ "dispatched": true, "worker": "w1", "bead_id": "b-1" })
    );
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);
    assert_eq!(
        tracker.calls(),
        vec![TrackerCall::Validate("b-1".to_string())]
    );
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn rejects_beads_the_validator_refuses() {
    let (engine, tracker, _) = engine();
    register(&engine, "w1").await;
    tracker.reject("b-bad", "Unknown bead b-bad");

    let data = submit(&engine, "b-bad").await;
    assert_eq!(
        data,
        json!({ "dispatched": false, "error": "Unknown bead b-bad", "bead_id": "b-bad" })
    );

    // nothing was activated; the same submission fails the same way
    let again = submit(&engine, "b-bad").await;
    assert_eq!(again["error"], json!("Unknown bead b-bad"));
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn duplicate_active_bead_is_rejected() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;

    let first = submit(&engine, "b-1").await;
    assert_eq!(first["dispatched"], json!(true));

    let second = submit(&engine, "b-1").await;
    assert_eq!(
        second,
        json!({
            "dispatched": false,
            "error": "Task already active or queued",
            "bead_id": "b-1"
        })
    );
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn queues_when_no_worker_is_available() {
    let (engine, _, _) = engine();

    let data = submit(&engine, "b-1").await;
    assert_eq!(
        data,
        json!({ "dispatched": false, "queued": true, "position": 1, "bead_id": "b-1" })
    );
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn queue_positions_grow_in_submission_order() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;

    for (bead, position) in [("b-1", 1), ("b-2", 2), ("b-3", 3)] {
        let data = submit(&engine, bead).await;
        assert_eq!(data["queued"], json!(true));
        assert_eq!(data["position"], json!(position), "bead {bead}");
    }
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn completion_drains_the_queue_head() {
    let (engine, _, _) = engine();
    register(&engine, "w1").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w1", "b-0").await;
    submit(&engine, "b-1").await;
    submit(&engine, "b-2").await;
    submit(&engine, "b-3").await;

    let done = call(&engine, "worker_done", json!({ "bead_id": "b-0" })).await;
    assert_eq!(done["worker"], json!("w1"));

    // b-1 went straight to the freed worker; b-2 and b-3 still queued
    engine
        .with_state(|s| {
            let queued: Vec<_> = s.queue().map(|b| b.as_str().to_string()).collect();
            assert_eq!(queued, vec!["b-2", "b-3"]);
            let w = s.worker("w1").unwrap();
            assert_eq!(w.current_task.as_ref().unwrap(), "b-1");
        })
        .await;
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Pending);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn prefers_the_least_recently_active_polling_worker() {
    let (engine, _, clock) = engine();

    // w3 busy executing so it is never a candidate
    register(&engine, "w3").await;
    submit(&engine, "b-0").await;
    ack(&engine, "w3", "b-0").await;

    register(&engine, "w2").await;
    register(&engine, "w1").await;

    // w2 has been polling for 5s, w1 for 1s
    let poll_w2 = spawn_poll(&engine, "w2", 30_000).await;
    clock.advance(Duration::from_secs(4));
    let poll_w1 = spawn_poll(&engine, "w1", 30_000).await;
    clock.advance(Duration::from_secs(1));

    let data = submit(&engine, "b-1").await;
    assert_eq!(data["worker"], json!("w2"));
    assert_eq!(poll_w2.await.unwrap()["task"]["bead_id"], json!("b-1"));

    // w1 still blocked; next submission goes to it
    let data = submit(&engine, "b-2").await;
    assert_eq!(data["worker"], json!("w1"));
    assert_eq!(poll_w1.await.unwrap()["task"]["bead_id"], json!("b-2"));
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn polling_workers_beat_idle_workers_regardless_of_age() {
    let (engine, _, clock) = engine();

    // w-idle is older than w-poll, but w-poll has a blocked request
    register(&engine, "w-idle").await;
    clock.advance(Duration::from_secs(10));
    register(&engine, "w-poll").await;
    let poll = spawn_poll(&engine, "w-poll", 30_000).await;

    let data = submit(&engine, "b-1").await;
    assert_eq!(data["worker"], json!("w-poll"));
    assert_eq!(poll.await.unwrap()["task"]["bead_id"], json!("b-1"));
}

#[tokio::test]
async fn idle_tie_breaks_by_registration_order() {
    let (engine, _, _) = engine();
    register(&engine, "w-b").await;
    register(&engine, "w-a").await;

    let data = submit(&engine, "b-1").await;
    assert_eq!(data["worker"], json!("w-b"));
}
