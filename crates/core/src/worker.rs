// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker records and name validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bead::BeadId;

/// Maximum length of a worker name in bytes.
pub const MAX_WORKER_NAME_LEN: usize = 64;

/// Where a worker is in its dispatch lifecycle.
///
/// Transitions are driven exclusively by the dispatch engine:
/// idle -> polling (long-poll with nothing pending), idle/polling -> pending
/// (task assigned), pending -> executing (task acknowledged), and any state
/// -> idle on completion, failure, timeout, or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Polling,
    Pending,
    Executing,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Polling => "polling",
            WorkerStatus::Pending => "pending",
            WorkerStatus::Executing => "executing",
        };
        write!(f, "{s}")
    }
}

impl WorkerStatus {
    /// A worker is available for dispatch when it holds no task.
    pub fn is_available(self) -> bool {
        matches!(self, WorkerStatus::Idle | WorkerStatus::Polling)
    }
}

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique name, stable for the worker's lifetime.
    pub name: String,
    pub status: WorkerStatus,
    /// Registration timestamp (epoch ms). Never mutated.
    pub registered_at: u64,
    /// Timestamp of the last state transition (epoch ms). LRU key.
    pub last_activity: u64,
    /// Bead the worker is assigned to, set in pending/executing.
    pub current_task: Option<BeadId>,
    /// When the worker acknowledged its task, set in executing.
    pub task_started_at: Option<u64>,
}

impl Worker {
    pub fn new(name: impl Into<String>, now_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: WorkerStatus::Idle,
            registered_at: now_ms,
            last_activity: now_ms,
            current_task: None,
            task_started_at: None,
        }
    }
}

/// Rejected worker name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("worker name is empty")]
    Empty,

    #[error("worker name exceeds {MAX_WORKER_NAME_LEN} characters")]
    TooLong,

    #[error("worker name contains invalid characters")]
    InvalidChars,
}

/// Validate a worker name against `^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$`.
pub fn validate_worker_name(name: &str) -> Result<(), NameError> {
    let bytes = name.as_bytes();
    let Some(first) = bytes.first() else {
        return Err(NameError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(NameError::InvalidChars);
    }
    if bytes.len() > MAX_WORKER_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if bytes[1..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    {
        Ok(())
    } else {
        Err(NameError::InvalidChars)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
