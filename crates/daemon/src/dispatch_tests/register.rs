// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn registers_a_worker() {
    let (engine, _, _) = engine();
    let data = register(&engine, "w1").await;
    assert_eq!(
        data,
        json!({ "success": true, "worker": "w1", "message": "Registered" })
    );
    assert_eq!(worker_status(&engine, "w1").await, WorkerStatus::Idle);
    assert_invariants(&engine).await;
}

#[tokio::test]
async fn rejects_invalid_names() {
    let (engine, _, _) = engine();
    for bad in ["", "-w", "w 1", "w/1"] {
        let data = register(&engine, bad).await;
        assert_eq!(data["success"], json!(false), "name {bad:?} accepted");
        assert!(
            data["error"]
                .as_str()
                .unwrap()
                .contains("Invalid worker name"),
            "unexpected error for {bad:?}: {data}"
        );
    }
    engine
        .with_state(|s| assert_eq!(s.workers().count(), 0))
        .await;
}

#[tokio::test]
async fn disambiguates_colliding_names() {
    let (engine, _, _) = engine();
    let first = register(&engine, "z.ai1").await;
    assert_eq!(first["worker"], json!("z.ai1"));
    assert_eq!(first["message"], json!("Registered"));

    let second = register(&engine, "z.ai1").await;
    assert_eq!(second["worker"], json!("z.ai1-1"));
    assert_eq!(second["message"], json!("Registered as z.ai1-1"));

    let third = register(&engine, "z.ai1").await;
    assert_eq!(third["worker"], json!("z.ai1-2"));
    assert_eq!(third["message"], json!("Registered as z.ai1-2"));
}

#[tokio::test]
async fn records_registration_time() {
    let (engine, _, clock) = engine();
    clock.set_epoch_ms(5_000);
    register(&engine, "w1").await;
    engine
        .with_state(|s| {
            let w = s.worker("w1").unwrap();
            assert_eq!(w.registered_at, 5_000);
            assert_eq!(w.last_activity, 5_000);
        })
        .await;
}

#[tokio::test]
async fn missing_params_fail_at_the_transport_level() {
    let (engine, _, _) = engine();
    let err = engine
        .handle("register_worker", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, crate::dispatch::HandlerError::InvalidParams(_)));
}

#[tokio::test]
async fn unknown_tool_is_a_transport_error() {
    let (engine, _, _) = engine();
    let err = engine.handle("frobnicate", json!({})).await.unwrap_err();
    assert!(matches!(err, crate::dispatch::HandlerError::UnknownTool(_)));
}
