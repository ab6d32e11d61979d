// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch engine tests, split by tool family.

mod complete;
mod poll;
mod register;
mod reset_retry;
mod status;
mod submit;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use beadbus_adapters::FakeTracker;
use beadbus_core::{FakeClock, WorkerStatus};

use super::Engine;

pub(self) type TestEngine = Engine<FakeTracker, FakeClock>;

/// Fresh engine plus handles to its fake collaborators.
fn engine() -> (Arc<TestEngine>, FakeTracker, FakeClock) {
    let tracker = FakeTracker::new();
    let clock = FakeClock::new();
    let engine = Arc::new(Engine::new(tracker.clone(), clock.clone()));
    (engine, tracker, clock)
}

/// Invoke a tool, panicking on transport-level failure.
async fn call(engine: &Arc<TestEngine>, tool: &str, params: Value) -> Value {
    engine.handle(tool, params).await.unwrap()
}

async fn register(engine: &Arc<TestEngine>, name: &str) -> Value {
    call(engine, "register_worker", json!({ "name": name })).await
}

async fn submit(engine: &Arc<TestEngine>, bead: &str) -> Value {
    call(engine, "submit_task", json!({ "bead_id": bead })).await
}

async fn ack(engine: &Arc<TestEngine>, worker: &str, bead: &str) -> Value {
    call(engine, "ack_task", json!({ "name": worker, "bead_id": bead })).await
}

/// Spawn a long-poll and give it time to block.
async fn spawn_poll(
    engine: &Arc<TestEngine>,
    name: &str,
    timeout_ms: u64,
) -> tokio::task::JoinHandle<Value> {
    let engine = Arc::clone(engine);
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        engine
            .handle("poll_task", json!({ "name": name, "timeout_ms": timeout_ms }))
            .await
            .unwrap()
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle
}

async fn worker_status(engine: &Arc<TestEngine>, name: &str) -> WorkerStatus {
    engine
        .with_state(|s| s.worker(name).map(|w| w.status))
        .await
        .unwrap()
}

/// Check the cross-collection invariants of the engine.
async fn assert_invariants(engine: &Arc<TestEngine>) {
    let pollers = engine.poller_names().await;
    engine
        .with_state(move |state| {
            let mut polling = Vec::new();
            for w in state.workers() {
                let holds = w.current_task.is_some();
                let busy = matches!(w.status, WorkerStatus::Pending | WorkerStatus::Executing);
                assert_eq!(holds, busy, "worker {} status/task mismatch", w.name);

                let has_pending = state.pending_task(&w.name).is_some();
                assert_eq!(
                    has_pending,
                    w.status == WorkerStatus::Pending,
                    "worker {} pending-task mismatch",
                    w.name
                );
                if let Some(task) = state.pending_task(&w.name) {
                    assert_eq!(w.current_task.as_ref(), Some(&task.bead_id));
                }
                if w.status == WorkerStatus::Polling {
                    polling.push(w.name.clone());
                }
            }
            polling.sort();
            assert_eq!(polling, pollers, "pollers out of sync with polling workers");

            let queued: Vec<_> = state.queue().collect();
            for (i, b) in queued.iter().enumerate() {
                assert!(state.is_active(b), "queued bead {b} not active");
                assert!(!queued[i + 1..].contains(b), "duplicate queued bead {b}");
            }
            let held = state
                .workers()
                .filter(|w| w.current_task.is_some())
                .count();
            assert_eq!(
                state.active_count(),
                queued.len() + held,
                "active set does not match queue + held tasks"
            );
        })
        .await;
}
