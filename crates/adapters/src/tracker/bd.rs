// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker backed by the `bd` CLI.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::subprocess::{run_with_timeout, TRACKER_TIMEOUT};

use super::{BeadTracker, TrackerError, Validation};

/// Bead tracker that shells out to the `bd` CLI.
///
/// The binary name defaults to `bd` and can be overridden with
/// `BEADBUS_BD_BIN` (useful for tests and non-standard installs).
#[derive(Debug, Clone)]
pub struct BdCliTracker {
    bin: String,
    timeout: Duration,
}

/// The subset of `bd show --json` output the daemon cares about.
#[derive(Debug, Deserialize)]
struct BeadInfo {
    status: String,
}

impl BdCliTracker {
    pub fn new() -> Self {
        let bin = std::env::var("BEADBUS_BD_BIN").unwrap_or_else(|_| "bd".to_string());
        Self {
            bin,
            timeout: TRACKER_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_bin(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            timeout: TRACKER_TIMEOUT,
        }
    }

    /// Run a `bd` subcommand, mapping non-zero exit to a command error.
    async fn run(&self, args: &[&str]) -> Result<String, TrackerError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        let description = format!("bd {}", args.first().unwrap_or(&""));

        let output = run_with_timeout(cmd, self.timeout, &description)
            .await
            .map_err(TrackerError::Invocation)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = match stderr.trim() {
                "" => stdout.trim().to_string(),
                s => s.to_string(),
            };
            return Err(TrackerError::Command {
                command: args.join(" "),
                message,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for BdCliTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BeadTracker for BdCliTracker {
    async fn validate(&self, bead_id: &str) -> Result<Validation, TrackerError> {
        debug!(bead_id, "validating bead");
        match self.run(&["show", bead_id, "--json"]).await {
            Ok(stdout) => {
                let info = parse_show_output(&stdout)?;
                Ok(validate_status(bead_id, &info.status))
            }
            // A failed show means the tracker does not know the bead; that
            // is a validation outcome, not an infrastructure error.
            Err(TrackerError::Command { message, .. }) => Ok(Validation::invalid(format!(
                "Unknown bead {bead_id}: {message}"
            ))),
            Err(e) => Err(e),
        }
    }

    async fn set_in_progress(&self, bead_id: &str) -> Result<(), TrackerError> {
        debug!(bead_id, "marking bead in progress");
        self.run(&["update", bead_id, "--status=in_progress"])
            .await?;
        Ok(())
    }

    async fn mark_blocked(&self, bead_id: &str, reason: &str) -> Result<(), TrackerError> {
        debug!(bead_id, reason, "marking bead blocked");
        let comment = format!("--comment={reason}");
        self.run(&["update", bead_id, "--status=blocked", &comment])
            .await?;
        Ok(())
    }
}

/// Parse `bd show --json` output.
fn parse_show_output(stdout: &str) -> Result<BeadInfo, TrackerError> {
    Ok(serde_json::from_str(stdout.trim())?)
}

/// Decide whether a bead in `status` may be submitted or retried.
fn validate_status(bead_id: &str, status: &str) -> Validation {
    match status {
        "closed" | "done" => Validation::invalid(format!("Bead {bead_id} is already {status}")),
        "in_progress" => Validation::invalid(format!("Bead {bead_id} is already in progress")),
        _ => Validation::ok(),
    }
}

#[cfg(test)]
#[path = "bd_tests.rs"]
mod tests;
