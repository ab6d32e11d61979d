// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state aggregate.
//!
//! `State` is the authoritative record of workers, their pending tasks, the
//! set of in-flight beads, and the overflow queue. It holds no policy: it
//! does not pick workers, run timers, or talk to the bead tracker. Policy
//! lives in the daemon's dispatch engine, which is also responsible for
//! re-establishing the aggregate invariants before releasing its
//! serialization guarantee:
//!
//! - a worker holds a task iff its status is pending or executing
//! - at most one pending task per worker, at most one worker per bead
//! - every queued bead is active, and the queue has no duplicates
//! - an active bead is queued, pending, or executing -- exactly one of them

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::bead::BeadId;
use crate::worker::{Worker, WorkerStatus};

/// A task assigned to a worker but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTask {
    pub bead_id: BeadId,
    pub assigned_at: u64,
}

/// The daemon's shared in-memory state.
///
/// Workers are kept in insertion order so selection tie-breaks are
/// deterministic.
#[derive(Debug, Default, Clone)]
pub struct State {
    workers: IndexMap<String, Worker>,
    pending_tasks: HashMap<String, PendingTask>,
    active_beads: HashSet<BeadId>,
    task_queue: VecDeque<BeadId>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Workers ───────────────────────────────────────────────────────

    /// Register a worker under `name`, disambiguating on collision by
    /// appending `-1`, `-2`, ... until an unused name is found.
    ///
    /// Returns the name actually assigned. The caller validates the name
    /// format beforehand.
    pub fn register(&mut self, name: &str, now_ms: u64) -> String {
        let assigned = if self.workers.contains_key(name) {
            let mut n = 1u32;
            loop {
                let candidate = format!("{name}-{n}");
                if !self.workers.contains_key(candidate.as_str()) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            name.to_string()
        };
        self.workers
            .insert(assigned.clone(), Worker::new(assigned.clone(), now_ms));
        assigned
    }

    pub fn worker(&self, name: &str) -> Option<&Worker> {
        self.workers.get(name)
    }

    pub fn contains_worker(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    /// All workers, in registration order.
    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    /// The worker currently holding `bead` as its task, if any.
    pub fn find_worker_holding(&self, bead: &BeadId) -> Option<&str> {
        self.workers
            .values()
            .find(|w| w.current_task.as_ref() == Some(bead))
            .map(|w| w.name.as_str())
    }

    // ── Worker transitions ────────────────────────────────────────────

    /// Mark a worker as long-polling.
    pub fn begin_poll(&mut self, name: &str, now_ms: u64) {
        if let Some(w) = self.workers.get_mut(name) {
            w.status = WorkerStatus::Polling;
            w.last_activity = now_ms;
        }
    }

    /// Return a polling worker to idle; a no-op in any other status.
    pub fn finish_poll(&mut self, name: &str, now_ms: u64) {
        if let Some(w) = self.workers.get_mut(name) {
            if w.status == WorkerStatus::Polling {
                w.status = WorkerStatus::Idle;
                w.last_activity = now_ms;
            }
        }
    }

    /// Assign `bead` to a worker: installs the pending task and moves the
    /// worker to pending. The bead must already be in the active set.
    pub fn assign(&mut self, name: &str, bead: BeadId, now_ms: u64) -> PendingTask {
        let task = PendingTask {
            bead_id: bead.clone(),
            assigned_at: now_ms,
        };
        self.pending_tasks.insert(name.to_string(), task.clone());
        if let Some(w) = self.workers.get_mut(name) {
            w.status = WorkerStatus::Pending;
            w.current_task = Some(bead);
            w.last_activity = now_ms;
        }
        task
    }

    /// Move a worker from pending to executing, consuming its pending task.
    pub fn begin_execution(&mut self, name: &str, now_ms: u64) -> Option<PendingTask> {
        let task = self.pending_tasks.remove(name);
        if let Some(w) = self.workers.get_mut(name) {
            w.status = WorkerStatus::Executing;
            w.task_started_at = Some(now_ms);
            w.last_activity = now_ms;
        }
        task
    }

    /// Return a worker to idle, dropping its task and any pending
    /// assignment.
    pub fn release(&mut self, name: &str, now_ms: u64) {
        self.pending_tasks.remove(name);
        if let Some(w) = self.workers.get_mut(name) {
            w.status = WorkerStatus::Idle;
            w.current_task = None;
            w.task_started_at = None;
            w.last_activity = now_ms;
        }
    }

    // ── Pending tasks ─────────────────────────────────────────────────

    pub fn pending_task(&self, name: &str) -> Option<&PendingTask> {
        self.pending_tasks.get(name)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_tasks.len()
    }

    // ── Active beads ──────────────────────────────────────────────────

    pub fn is_active(&self, bead: &BeadId) -> bool {
        self.active_beads.contains(bead)
    }

    /// Add a bead to the active set. Returns false if it was already there.
    pub fn activate(&mut self, bead: BeadId) -> bool {
        self.active_beads.insert(bead)
    }

    /// Remove a bead from the active set and from the queue, if present.
    pub fn deactivate(&mut self, bead: &BeadId) -> bool {
        self.task_queue.retain(|b| b != bead);
        self.active_beads.remove(bead)
    }

    pub fn active_count(&self) -> usize {
        self.active_beads.len()
    }

    // ── Overflow queue ────────────────────────────────────────────────

    /// Append a bead to the queue, returning its 1-based position.
    pub fn enqueue(&mut self, bead: BeadId) -> usize {
        self.task_queue.push_back(bead);
        self.task_queue.len()
    }

    pub fn dequeue(&mut self) -> Option<BeadId> {
        self.task_queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.task_queue.len()
    }

    pub fn queue(&self) -> impl Iterator<Item = &BeadId> {
        self.task_queue.iter()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
