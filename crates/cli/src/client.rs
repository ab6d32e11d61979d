// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.
//!
//! Opens one connection per request: write one NDJSON frame, read frames
//! until the matching id arrives. Shutdown notices from the daemon abort
//! the request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use beadbus_daemon::socket;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("daemon is shutting down")]
    ShuttingDown,

    #[error("request timed out")]
    Timeout,

    #[error("daemon closed the connection")]
    ConnectionClosed,

    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame from daemon: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client bound to one project's daemon socket.
pub struct BusClient {
    socket_path: PathBuf,
}

impl BusClient {
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            socket_path: socket::socket_path(project_root),
        }
    }

    /// Invoke one tool and return its data payload.
    pub async fn call(
        &self,
        tool: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        if !self.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(self.socket_path.clone()));
        }

        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let id = uuid::Uuid::new_v4().to_string();
        let frame = serde_json::to_string(&json!({ "id": id, "tool": tool, "params": params }))?;
        writer.write_all(format!("{frame}\n").as_bytes()).await?;
        writer.flush().await?;

        let response = tokio::time::timeout(timeout, read_matching(&mut lines, &id))
            .await
            .map_err(|_| ClientError::Timeout)??;
        extract_data(response)
    }
}

/// Read frames until one carries our request id.
async fn read_matching(
    lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
    id: &str,
) -> Result<Value, ClientError> {
    loop {
        let Some(line) = lines.next_line().await? else {
            return Err(ClientError::ConnectionClosed);
        };
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line.trim())?;
        if value.get("type").and_then(Value::as_str) == Some("shutdown") {
            return Err(ClientError::ShuttingDown);
        }
        if value.get("id").and_then(Value::as_str) == Some(id) {
            return Ok(value);
        }
    }
}

/// Unwrap a response frame into its tool data, mapping transport failures.
fn extract_data(response: Value) -> Result<Value, ClientError> {
    if response.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(response.get("data").cloned().unwrap_or(Value::Null));
    }
    Err(ClientError::Rejected {
        code: response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string(),
        message: response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
