// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// Assert the cross-collection invariants of the aggregate.
fn assert_invariants(state: &State) {
    for w in state.workers() {
        // worker holds a task iff pending or executing
        let holds = w.current_task.is_some();
        let busy = matches!(w.status, WorkerStatus::Pending | WorkerStatus::Executing);
        assert_eq!(holds, busy, "worker {} status/task mismatch", w.name);

        // pending_tasks entry iff status pending
        let has_pending = state.pending_task(&w.name).is_some();
        assert_eq!(
            has_pending,
            w.status == WorkerStatus::Pending,
            "worker {} pending-task mismatch",
            w.name
        );
    }

    // queue has no duplicates and every element is active
    let queued: Vec<_> = state.queue().collect();
    for (i, b) in queued.iter().enumerate() {
        assert!(state.is_active(b), "queued bead {b} not active");
        assert!(!queued[i + 1..].contains(b), "duplicate queued bead {b}");
    }

    // every active bead is queued, pending, or held -- exactly once
    let held: Vec<_> = state
        .workers()
        .filter_map(|w| w.current_task.clone())
        .collect();
    for w in state.workers() {
        if let Some(t) = state.pending_task(&w.name) {
            assert_eq!(w.current_task.as_ref(), Some(&t.bead_id));
        }
    }
    for b in state.workers().filter_map(|w| w.current_task.as_ref()) {
        assert!(state.is_active(b), "held bead {b} not active");
    }
    let active_total = state.active_count();
    let mut accounted = 0;
    accounted += queued.len();
    accounted += held.len();
    assert_eq!(
        active_total, accounted,
        "active set does not match queue + held tasks"
    );
}

// ── Registration ──────────────────────────────────────────────────────

#[test]
fn register_creates_idle_worker() {
    let mut state = State::new();
    let name = state.register("w1", 100);
    assert_eq!(name, "w1");
    let w = state.worker("w1").unwrap();
    assert_eq!(w.status, WorkerStatus::Idle);
    assert_eq!(w.registered_at, 100);
    assert_invariants(&state);
}

#[test]
fn register_disambiguates_on_collision() {
    let mut state = State::new();
    assert_eq!(state.register("z.ai1", 1), "z.ai1");
    assert_eq!(state.register("z.ai1", 2), "z.ai1-1");
    assert_eq!(state.register("z.ai1", 3), "z.ai1-2");
    assert!(state.contains_worker("z.ai1"));
    assert!(state.contains_worker("z.ai1-1"));
    assert!(state.contains_worker("z.ai1-2"));
}

#[test]
fn register_skips_taken_suffixes() {
    let mut state = State::new();
    state.register("w", 1);
    state.register("w-1", 1);
    assert_eq!(state.register("w", 2), "w-2");
}

#[test]
fn workers_iterate_in_registration_order() {
    let mut state = State::new();
    state.register("b", 1);
    state.register("a", 2);
    state.register("c", 3);
    let names: Vec<_> = state.workers().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
}

// ── Transitions ───────────────────────────────────────────────────────

#[test]
fn assign_installs_pending_task() {
    let mut state = State::new();
    state.register("w1", 1);
    state.activate(BeadId::new("b-1"));
    let task = state.assign("w1", BeadId::new("b-1"), 50);

    assert_eq!(task.bead_id, "b-1");
    assert_eq!(task.assigned_at, 50);
    let w = state.worker("w1").unwrap();
    assert_eq!(w.status, WorkerStatus::Pending);
    assert_eq!(w.current_task.as_ref().unwrap(), "b-1");
    assert_eq!(w.last_activity, 50);
    assert_invariants(&state);
}

#[test]
fn begin_execution_consumes_pending_task() {
    let mut state = State::new();
    state.register("w1", 1);
    state.activate(BeadId::new("b-1"));
    state.assign("w1", BeadId::new("b-1"), 50);

    let task = state.begin_execution("w1", 60).unwrap();
    assert_eq!(task.bead_id, "b-1");
    let w = state.worker("w1").unwrap();
    assert_eq!(w.status, WorkerStatus::Executing);
    assert_eq!(w.task_started_at, Some(60));
    assert!(state.pending_task("w1").is_none());
    assert_invariants(&state);
}

#[test]
fn release_clears_task_and_pending_entry() {
    let mut state = State::new();
    state.register("w1", 1);
    state.activate(BeadId::new("b-1"));
    state.assign("w1", BeadId::new("b-1"), 50);

    state.deactivate(&BeadId::new("b-1"));
    state.release("w1", 70);
    let w = state.worker("w1").unwrap();
    assert_eq!(w.status, WorkerStatus::Idle);
    assert!(w.current_task.is_none());
    assert!(w.task_started_at.is_none());
    assert_eq!(w.last_activity, 70);
    assert!(state.pending_task("w1").is_none());
    assert_invariants(&state);
}

#[test]
fn finish_poll_only_affects_polling_workers() {
    let mut state = State::new();
    state.register("w1", 1);
    state.begin_poll("w1", 10);
    assert_eq!(state.worker("w1").unwrap().status, WorkerStatus::Polling);

    state.finish_poll("w1", 20);
    assert_eq!(state.worker("w1").unwrap().status, WorkerStatus::Idle);

    // not polling: no-op, timestamp untouched
    state.activate(BeadId::new("b"));
    state.assign("w1", BeadId::new("b"), 30);
    state.finish_poll("w1", 40);
    let w = state.worker("w1").unwrap();
    assert_eq!(w.status, WorkerStatus::Pending);
    assert_eq!(w.last_activity, 30);
}

#[test]
fn find_worker_holding_matches_current_task() {
    let mut state = State::new();
    state.register("w1", 1);
    state.register("w2", 1);
    state.activate(BeadId::new("b-1"));
    state.assign("w2", BeadId::new("b-1"), 5);

    assert_eq!(state.find_worker_holding(&BeadId::new("b-1")), Some("w2"));
    assert_eq!(state.find_worker_holding(&BeadId::new("b-2")), None);
}

// ── Active set and queue ──────────────────────────────────────────────

#[test]
fn activate_is_idempotent_on_membership() {
    let mut state = State::new();
    assert!(state.activate(BeadId::new("b")));
    assert!(!state.activate(BeadId::new("b")));
    assert_eq!(state.active_count(), 1);
}

#[test]
fn enqueue_returns_one_based_position() {
    let mut state = State::new();
    state.activate(BeadId::new("b1"));
    state.activate(BeadId::new("b2"));
    assert_eq!(state.enqueue(BeadId::new("b1")), 1);
    assert_eq!(state.enqueue(BeadId::new("b2")), 2);
    assert_invariants(&state);
}

#[test]
fn dequeue_is_fifo() {
    let mut state = State::new();
    state.activate(BeadId::new("b1"));
    state.activate(BeadId::new("b2"));
    state.enqueue(BeadId::new("b1"));
    state.enqueue(BeadId::new("b2"));

    assert_eq!(state.dequeue().unwrap(), "b1");
    assert_eq!(state.dequeue().unwrap(), "b2");
    assert!(state.dequeue().is_none());
}

#[test]
fn deactivate_removes_from_queue_too() {
    let mut state = State::new();
    state.activate(BeadId::new("b1"));
    state.activate(BeadId::new("b2"));
    state.enqueue(BeadId::new("b1"));
    state.enqueue(BeadId::new("b2"));

    assert!(state.deactivate(&BeadId::new("b1")));
    assert_eq!(state.queue_len(), 1);
    assert_eq!(state.queue().next().unwrap(), "b2");
    assert_invariants(&state);
}
