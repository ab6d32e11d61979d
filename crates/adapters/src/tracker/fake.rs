// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake tracker for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BeadTracker, TrackerError, Validation};

/// A recorded tracker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    Validate(String),
    SetInProgress(String),
    MarkBlocked(String, String),
}

#[derive(Default)]
struct FakeInner {
    calls: Vec<TrackerCall>,
    rejected: HashMap<String, String>,
    set_in_progress_error: Option<String>,
    mark_blocked_error: Option<String>,
}

/// Fake tracker that records calls and returns configured outcomes.
///
/// Every bead validates by default; use [`reject`](FakeTracker::reject) and
/// the `fail_*` methods to script failures.
#[derive(Clone, Default)]
pub struct FakeTracker {
    inner: Arc<Mutex<FakeInner>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `validate(bead_id)` report invalid with the given reason.
    pub fn reject(&self, bead_id: &str, reason: &str) {
        self.inner
            .lock()
            .rejected
            .insert(bead_id.to_string(), reason.to_string());
    }

    /// Make every `set_in_progress` call fail with the given message.
    pub fn fail_set_in_progress(&self, message: &str) {
        self.inner.lock().set_in_progress_error = Some(message.to_string());
    }

    /// Make every `mark_blocked` call fail with the given message.
    pub fn fail_mark_blocked(&self, message: &str) {
        self.inner.lock().mark_blocked_error = Some(message.to_string());
    }

    /// Clear any scripted `fail_*` outcomes.
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.set_in_progress_error = None;
        inner.mark_blocked_error = None;
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<TrackerCall> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl BeadTracker for FakeTracker {
    async fn validate(&self, bead_id: &str) -> Result<Validation, TrackerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(TrackerCall::Validate(bead_id.to_string()));
        match inner.rejected.get(bead_id) {
            Some(reason) => Ok(Validation::invalid(reason.clone())),
            None => Ok(Validation::ok()),
        }
    }

    async fn set_in_progress(&self, bead_id: &str) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(TrackerCall::SetInProgress(bead_id.to_string()));
        match &inner.set_in_progress_error {
            Some(message) => Err(TrackerError::Command {
                command: format!("update {bead_id} --status=in_progress"),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn mark_blocked(&self, bead_id: &str, reason: &str) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(TrackerCall::MarkBlocked(
            bead_id.to_string(),
            reason.to_string(),
        ));
        match &inner.mark_blocked_error {
            Some(message) => Err(TrackerError::Command {
                command: format!("update {bead_id} --status=blocked"),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
