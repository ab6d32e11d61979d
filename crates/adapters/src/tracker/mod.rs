// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bead tracker integration.
//!
//! The tracker is an out-of-process metadata store for beads, driven
//! through its `bd` CLI. The daemon only needs three operations from it and
//! never retries them; any failure is reported back to the caller of the
//! tool that triggered the call.

mod bd;

pub use bd::BdCliTracker;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTracker, TrackerCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The CLI could not be run at all (missing binary, timeout).
    #[error("{0}")]
    Invocation(String),

    /// The CLI ran and reported failure.
    #[error("bd {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("invalid JSON from bd show: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a bead validation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub error: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }
}

/// Operations the daemon needs from the bead tracker.
#[async_trait]
pub trait BeadTracker: Send + Sync {
    /// Is this bead id known and in a state acceptable for
    /// submission/retry?
    async fn validate(&self, bead_id: &str) -> Result<Validation, TrackerError>;

    /// Transition the bead to "in progress".
    async fn set_in_progress(&self, bead_id: &str) -> Result<(), TrackerError>;

    /// Transition the bead to "blocked" with a reason.
    async fn mark_blocked(&self, bead_id: &str, reason: &str) -> Result<(), TrackerError>;
}
