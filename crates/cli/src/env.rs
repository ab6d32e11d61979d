// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for ordinary IPC requests.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("BEADBUS_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Extra slack granted on top of a long-poll's own timeout.
pub fn poll_margin() -> Duration {
    parse_duration_ms("BEADBUS_TIMEOUT_POLL_MARGIN_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting on a daemon process to exit.
pub fn timeout_exit() -> Duration {
    parse_duration_ms("BEADBUS_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}
