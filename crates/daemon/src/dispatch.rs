// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch engine: the policy layer over the state core.
//!
//! All tool handlers run under one async mutex, which is the daemon's
//! serializing execution context: a handler owns the whole engine for its
//! body, including any bead-tracker call it awaits. The single exception
//! is `poll_task`, which releases the lock before suspending on its
//! one-shot resolver so dispatching operations can run while pollers wait.
//!
//! Resolution order matters: a dispatch installs the pending task and
//! transitions the worker *before* signalling the poller, so the resumed
//! poll observes fully mutated state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use beadbus_adapters::BeadTracker;
use beadbus_core::{validate_worker_name, BeadId, Clock, PendingTask, State, WorkerStatus};

use crate::protocol::{StatusData, WorkerStatusEntry};

/// Default long-poll timeout.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 30_000;

/// Transport-level handler failures. Logical failures (unknown worker,
/// task mismatch, ...) are successful results whose payload says so.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidParams(String),
}

/// How a blocked poll ended.
enum PollOutcome {
    Task(PendingTask),
    TimedOut,
}

/// A suspended `poll_task` waiting for work.
struct BlockedPoller {
    resolver: oneshot::Sender<PollOutcome>,
    timer: AbortHandle,
}

/// Everything guarded by the serialization mutex.
struct Shared {
    state: State,
    pollers: HashMap<String, BlockedPoller>,
}

/// The dispatch engine.
pub struct Engine<T, C> {
    shared: Mutex<Shared>,
    tracker: T,
    clock: C,
}

impl<T, C> Engine<T, C>
where
    T: BeadTracker + 'static,
    C: Clock + 'static,
{
    pub fn new(tracker: T, clock: C) -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: State::new(),
                pollers: HashMap::new(),
            }),
            tracker,
            clock,
        }
    }

    /// Route a tool invocation to its handler.
    pub async fn handle(self: &Arc<Self>, tool: &str, params: Value) -> Result<Value, HandlerError> {
        let params = if params.is_null() { json!({}) } else { params };
        match tool {
            "register_worker" => Ok(self.register_worker(parse(params)?).await),
            "poll_task" => Ok(self.poll_task(parse(params)?).await),
            "ack_task" => Ok(self.ack_task(parse(params)?).await),
            "submit_task" => Ok(self.submit_task(parse(params)?).await),
            "worker_done" => Ok(self.worker_done(parse(params)?).await),
            "task_failed" => Ok(self.task_failed(parse(params)?).await),
            "reset_worker" => Ok(self.reset_worker(parse(params)?).await),
            "retry_task" => Ok(self.retry_task(parse(params)?).await),
            "get_status" => Ok(self.get_status().await),
            other => Err(HandlerError::UnknownTool(other.to_string())),
        }
    }

    // ── register_worker ───────────────────────────────────────────────

    async fn register_worker(&self, p: RegisterParams) -> Value {
        if let Err(e) = validate_worker_name(&p.name) {
            return logical_error(format!("Invalid worker name {:?}: {e}", p.name));
        }
        let mut shared = self.shared.lock().await;
        let assigned = shared.state.register(&p.name, self.clock.epoch_ms());
        let message = if assigned == p.name {
            "Registered".to_string()
        } else {
            format!("Registered as {assigned}")
        };
        info!(worker = %assigned, "worker registered");
        json!({ "success": true, "worker": assigned, "message": message })
    }

    // ── poll_task ─────────────────────────────────────────────────────

    async fn poll_task(self: &Arc<Self>, p: PollParams) -> Value {
        if let Err(e) = validate_worker_name(&p.name) {
            return logical_error(format!("Invalid worker name {:?}: {e}", p.name));
        }

        let rx = {
            let mut shared = self.shared.lock().await;
            let Some(worker) = shared.state.worker(&p.name) else {
                return logical_error(format!("Unknown worker: {}", p.name));
            };

            // an assignment made while the worker was away is handed over
            // as-is; the worker is already `pending` and stays so
            if let Some(task) = shared.state.pending_task(&p.name) {
                return json!({ "task": task_payload(task) });
            }

            match worker.status {
                WorkerStatus::Polling => {
                    return logical_error(format!("Worker {} is already polling", p.name));
                }
                WorkerStatus::Executing => {
                    let bead = worker.current_task.clone();
                    return logical_error(format!(
                        "Worker {} is executing {}; finish or reset it first",
                        p.name,
                        bead.map(|b| b.0).unwrap_or_default()
                    ));
                }
                WorkerStatus::Idle | WorkerStatus::Pending => {}
            }

            let (tx, rx) = oneshot::channel();
            let timer = self.spawn_poll_timer(p.name.clone(), p.timeout_ms);
            shared.state.begin_poll(&p.name, self.clock.epoch_ms());
            shared.pollers.insert(
                p.name.clone(),
                BlockedPoller {
                    resolver: tx,
                    timer,
                },
            );
            debug!(worker = %p.name, timeout_ms = p.timeout_ms, "poll blocked");
            rx
        };

        match rx.await {
            Ok(PollOutcome::Task(task)) => json!({ "task": task_payload(&task) }),
            Ok(PollOutcome::TimedOut) => json!({ "task": null, "timeout": true }),
            // resolver dropped without an outcome: the worker was reset or
            // the daemon is shutting down
            Err(_) => json!({ "task": null, "cancelled": true }),
        }
    }

    fn spawn_poll_timer(self: &Arc<Self>, name: String, timeout_ms: u64) -> AbortHandle {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            engine.expire_poll(&name).await;
        })
        .abort_handle()
    }

    /// Timer callback: resolve a still-installed poller with the timeout
    /// sentinel.
    async fn expire_poll(&self, name: &str) {
        let mut shared = self.shared.lock().await;
        let Some(poller) = shared.pollers.remove(name) else {
            // already resolved by dispatch or removed by reset
            return;
        };
        shared.state.finish_poll(name, self.clock.epoch_ms());
        debug!(worker = name, "poll timed out");
        let _ = poller.resolver.send(PollOutcome::TimedOut);
    }

    // ── ack_task ──────────────────────────────────────────────────────

    async fn ack_task(&self, p: AckParams) -> Value {
        let mut shared = self.shared.lock().await;
        let expected = match shared.state.pending_task(&p.name) {
            Some(task) => task.bead_id.clone(),
            None => return logical_error(format!("No pending task for worker {}", p.name)),
        };
        if expected != p.bead_id.as_str() {
            return logical_error(format!(
                "Task mismatch: expected {expected}, got {}",
                p.bead_id
            ));
        }

        match self.tracker.set_in_progress(&p.bead_id).await {
            Ok(()) => {
                shared.state.begin_execution(&p.name, self.clock.epoch_ms());
                info!(worker = %p.name, bead = %p.bead_id, "task acknowledged");
                json!({ "success": true, "worker": p.name, "bead_id": p.bead_id })
            }
            Err(e) => {
                // roll the assignment back so the bead can be resubmitted
                let bead = BeadId::new(p.bead_id.clone());
                shared.state.release(&p.name, self.clock.epoch_ms());
                shared.state.deactivate(&bead);
                warn!(worker = %p.name, bead = %p.bead_id, error = %e, "ack rolled back");
                logical_error(format!("Failed to update bead {}: {e}", p.bead_id))
            }
        }
    }

    // ── submit_task ───────────────────────────────────────────────────

    async fn submit_task(&self, p: BeadParams) -> Value {
        let mut shared = self.shared.lock().await;
        if let Err(reason) = self.validate_bead(&p.bead_id).await {
            return json!({ "dispatched": false, "error": reason, "bead_id": p.bead_id });
        }
        let bead = BeadId::new(p.bead_id.clone());
        if shared.state.is_active(&bead) {
            return json!({
                "dispatched": false,
                "error": "Task already active or queued",
                "bead_id": p.bead_id
            });
        }
        self.dispatch_or_enqueue(&mut shared, bead)
    }

    // ── worker_done ───────────────────────────────────────────────────

    async fn worker_done(&self, p: BeadParams) -> Value {
        let mut shared = self.shared.lock().await;
        let bead = BeadId::new(p.bead_id.clone());
        shared.state.deactivate(&bead);

        let Some(worker) = shared.state.find_worker_holding(&bead).map(str::to_string) else {
            // tolerate re-delivery after the worker already moved on
            return json!({ "success": true, "bead_id": p.bead_id, "warning": "Worker not found" });
        };
        shared.state.release(&worker, self.clock.epoch_ms());
        info!(worker = %worker, bead = %p.bead_id, "task completed");
        self.drain_queue(&mut shared);
        json!({ "success": true, "bead_id": p.bead_id, "worker": worker })
    }

    // ── task_failed ───────────────────────────────────────────────────

    async fn task_failed(&self, p: FailParams) -> Value {
        let mut shared = self.shared.lock().await;
        if let Err(e) = self.tracker.mark_blocked(&p.bead_id, &p.reason).await {
            return logical_error(format!("Failed to mark bead {} blocked: {e}", p.bead_id));
        }

        let bead = BeadId::new(p.bead_id.clone());
        shared.state.deactivate(&bead);
        if let Some(worker) = shared.state.find_worker_holding(&bead).map(str::to_string) {
            shared.state.release(&worker, self.clock.epoch_ms());
        }
        warn!(bead = %p.bead_id, reason = %p.reason, "task failed");
        self.drain_queue(&mut shared);
        json!({ "success": true, "bead_id": p.bead_id, "status": "blocked", "reason": p.reason })
    }

    // ── reset_worker ──────────────────────────────────────────────────

    async fn reset_worker(&self, p: ResetParams) -> Value {
        let mut shared = self.shared.lock().await;
        if !shared.state.contains_worker(&p.worker_name) {
            return logical_error(format!("Unknown worker: {}", p.worker_name));
        }

        let previous = shared
            .state
            .worker(&p.worker_name)
            .and_then(|w| w.current_task.clone());
        if let Some(bead) = &previous {
            shared.state.deactivate(bead);
        }
        if let Some(poller) = shared.pollers.remove(&p.worker_name) {
            // dropped unresolved: the suspended poll completes as cancelled
            poller.timer.abort();
        }
        shared.state.release(&p.worker_name, self.clock.epoch_ms());
        info!(worker = %p.worker_name, previous = ?previous, "worker reset");
        self.drain_queue(&mut shared);
        json!({
            "success": true,
            "worker": p.worker_name,
            "previous_task": previous.map(|b| b.0)
        })
    }

    // ── retry_task ────────────────────────────────────────────────────

    async fn retry_task(&self, p: BeadParams) -> Value {
        let mut shared = self.shared.lock().await;
        let bead = BeadId::new(p.bead_id.clone());
        if shared.state.is_active(&bead) {
            return json!({
                "dispatched": false,
                "error": "Task still active — use reset_worker first if worker died",
                "bead_id": p.bead_id
            });
        }
        if let Err(reason) = self.validate_bead(&p.bead_id).await {
            return json!({ "dispatched": false, "error": reason, "bead_id": p.bead_id });
        }
        self.dispatch_or_enqueue(&mut shared, bead)
    }

    // ── get_status ────────────────────────────────────────────────────

    async fn get_status(&self) -> Value {
        let shared = self.shared.lock().await;
        let now = self.clock.epoch_ms();
        let workers = shared
            .state
            .workers()
            .map(|w| WorkerStatusEntry {
                name: w.name.clone(),
                status: w.status,
                current_task: w.current_task.clone().map(|b| b.0),
                idle_seconds: w
                    .status
                    .is_available()
                    .then(|| now.saturating_sub(w.last_activity) / 1000),
                pending_task: shared
                    .state
                    .pending_task(&w.name)
                    .map(|t| t.bead_id.0.clone()),
            })
            .collect();
        let data = StatusData {
            workers,
            queued_tasks: shared.state.queue_len(),
            queue: shared.state.queue().map(|b| b.0.clone()).collect(),
            polling_workers: shared.pollers.len(),
            pending_workers: shared.state.pending_count(),
        };
        serde_json::to_value(data).unwrap_or_else(|_| json!({}))
    }

    // ── Shared helpers ────────────────────────────────────────────────

    /// Check a bead with the validator, folding tracker failures into the
    /// rejection reason.
    async fn validate_bead(&self, bead_id: &str) -> Result<(), String> {
        match self.tracker.validate(bead_id).await {
            Ok(v) if v.valid => Ok(()),
            Ok(v) => Err(v
                .error
                .unwrap_or_else(|| format!("Bead {bead_id} failed validation"))),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Dispatch a bead to the LRU available worker, or queue it.
    ///
    /// The bead enters the active set either way.
    fn dispatch_or_enqueue(&self, shared: &mut Shared, bead: BeadId) -> Value {
        let now = self.clock.epoch_ms();
        shared.state.activate(bead.clone());
        match select_worker(&shared.state) {
            Some(worker) => {
                let task = shared.state.assign(&worker, bead.clone(), now);
                resolve_poller(shared, &worker, task);
                info!(worker = %worker, bead = %bead, "task dispatched");
                json!({ "dispatched": true, "worker": worker, "bead_id": bead.0 })
            }
            None => {
                let position = shared.state.enqueue(bead.clone());
                info!(bead = %bead, position, "no worker available, task queued");
                json!({
                    "dispatched": false,
                    "queued": true,
                    "position": position,
                    "bead_id": bead.0
                })
            }
        }
    }

    /// Hand queued beads to workers for as long as both are available.
    fn drain_queue(&self, shared: &mut Shared) {
        let now = self.clock.epoch_ms();
        while shared.state.queue_len() > 0 {
            let Some(worker) = select_worker(&shared.state) else {
                break;
            };
            let Some(bead) = shared.state.dequeue() else {
                break;
            };
            // the bead stays active: it entered the set when enqueued
            let task = shared.state.assign(&worker, bead.clone(), now);
            resolve_poller(shared, &worker, task);
            info!(worker = %worker, bead = %bead, "queued task dispatched");
        }
    }

    /// Cancel every blocked poller. Suspended polls complete as cancelled.
    pub async fn cancel_pollers(&self) {
        let mut shared = self.shared.lock().await;
        for (_, poller) in shared.pollers.drain() {
            poller.timer.abort();
        }
    }

    #[cfg(test)]
    pub(crate) async fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let shared = self.shared.lock().await;
        f(&shared.state)
    }

    #[cfg(test)]
    pub(crate) async fn poller_names(&self) -> Vec<String> {
        let shared = self.shared.lock().await;
        let mut names: Vec<String> = shared.pollers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// LRU selection: prefer polling workers (a blocked request is waiting),
/// then idle ones; within a group, least-recent `last_activity` wins and
/// ties go to the earliest-registered worker.
fn select_worker(state: &State) -> Option<String> {
    let polling = state
        .workers()
        .filter(|w| w.status == WorkerStatus::Polling)
        .min_by_key(|w| w.last_activity);
    polling
        .or_else(|| {
            state
                .workers()
                .filter(|w| w.status == WorkerStatus::Idle)
                .min_by_key(|w| w.last_activity)
        })
        .map(|w| w.name.clone())
}

/// Wake a worker's blocked poller with its freshly assigned task.
///
/// State is already mutated by the time this runs; the send is the last
/// step so the resumed poll observes the pending task and the `pending`
/// status.
fn resolve_poller(shared: &mut Shared, worker: &str, task: PendingTask) {
    if let Some(poller) = shared.pollers.remove(worker) {
        poller.timer.abort();
        let _ = poller.resolver.send(PollOutcome::Task(task));
    }
}

fn logical_error(message: impl Into<String>) -> Value {
    json!({ "success": false, "error": message.into() })
}

fn task_payload(task: &PendingTask) -> Value {
    json!({ "bead_id": task.bead_id.0, "assigned_at": task.assigned_at })
}

fn parse<P: DeserializeOwned>(params: Value) -> Result<P, HandlerError> {
    serde_json::from_value(params).map_err(|e| HandlerError::InvalidParams(format!("Invalid params: {e}")))
}

fn default_poll_timeout() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

#[derive(Debug, Deserialize)]
struct RegisterParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PollParams {
    name: String,
    #[serde(default = "default_poll_timeout")]
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct AckParams {
    name: String,
    bead_id: String,
}

#[derive(Debug, Deserialize)]
struct BeadParams {
    bead_id: String,
}

#[derive(Debug, Deserialize)]
struct FailParams {
    bead_id: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ResetParams {
    worker_name: String,
}

#[cfg(test)]
#[path = "dispatch_tests/mod.rs"]
mod tests;
