// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: one JSON value per line (NDJSON), no length prefix.
//! Requests carry an `id` the client chooses; the matching response echoes
//! it. The only server-initiated frame is the shutdown notice.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beadbus_core::WorkerStatus;

/// Substitute id for frames whose own id cannot be recovered.
pub const UNKNOWN_ID: &str = "unknown";

/// A tool invocation from a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub params: Value,
}

/// Transport-level error codes (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownTool,
    InvalidParams,
    Internal,
    Timeout,
}

/// Response to a single request.
///
/// Logical failures (unknown worker, task mismatch, ...) are *successful*
/// responses whose data payload carries `success: false`; this enum only
/// distinguishes transport-level outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Success {
        id: String,
        success: bool,
        data: Value,
    },
    Failure {
        id: String,
        success: bool,
        error: ErrorCode,
        message: String,
    },
}

impl Response {
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        Response::Success {
            id: id.into(),
            success: true,
            data,
        }
    }

    pub fn error(id: impl Into<String>, error: ErrorCode, message: impl Into<String>) -> Self {
        Response::Failure {
            id: id.into(),
            success: false,
            error,
            message: message.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Response::Success { id, .. } => id,
            Response::Failure { id, .. } => id,
        }
    }
}

/// Server-initiated notification frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notice {
    Shutdown,
}

/// Parse one frame into a request.
///
/// Returns a ready-to-send error response when the frame is unusable:
/// malformed JSON or a missing id are answered under the id `"unknown"`, a
/// missing tool under the request's own id. The connection survives either
/// way.
pub fn parse_frame(line: &str) -> Result<Request, Response> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        Response::error(UNKNOWN_ID, ErrorCode::InvalidParams, format!("Invalid JSON: {e}"))
    })?;

    let id = match value.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            return Err(Response::error(
                UNKNOWN_ID,
                ErrorCode::InvalidParams,
                "Missing request id",
            ))
        }
    };

    let tool = match value.get("tool").and_then(Value::as_str) {
        Some(tool) => tool.to_string(),
        None => {
            return Err(Response::error(
                id,
                ErrorCode::InvalidParams,
                "Missing tool name",
            ))
        }
    };

    let params = value.get("params").cloned().unwrap_or(Value::Null);

    Ok(Request { id, tool, params })
}

/// One worker's line in a status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerStatusEntry {
    pub name: String,
    pub status: WorkerStatus,
    pub current_task: Option<String>,
    /// Whole seconds since the last transition, for available workers only.
    pub idle_seconds: Option<u64>,
    pub pending_task: Option<String>,
}

/// Data payload of `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusData {
    pub workers: Vec<WorkerStatusEntry>,
    pub queued_tasks: usize,
    pub queue: Vec<String>,
    pub polling_workers: usize,
    pub pending_workers: usize,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
