// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project socket layout and stale-socket detection.
//!
//! Every project root maps deterministically to one socket under `/tmp`, so
//! independent projects get independent daemons and repeated startups in
//! the same project find the same socket. md5 is used purely as a path
//! hasher; eight hex characters are plenty for uniqueness within one
//! user's `/tmp`.

use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Socket path for a project root: `/tmp/claude-bus-<hash8>.sock`.
pub fn socket_path(project_root: &Path) -> PathBuf {
    let digest = md5::compute(project_root.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    PathBuf::from(format!("/tmp/claude-bus-{}.sock", &hex[..8]))
}

/// PID file path beside a socket.
pub fn pid_path(socket_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.pid", socket_path.display()))
}

/// Daemon log file path beside a socket.
pub fn log_path(socket_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.log", socket_path.display()))
}

/// Read the PID file, returning the PID only if it parses as a positive
/// integer.
pub fn read_pid(pid_path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(pid_path).ok()?;
    let pid = content.trim().parse::<u32>().ok()?;
    (pid > 0).then_some(pid)
}

/// Check whether a process exists via signal 0.
///
/// EPERM means the process exists but belongs to someone else; any other
/// error means it is gone.
pub fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// A socket is stale when its PID file is missing, unparseable, or names a
/// dead process.
pub fn is_stale(socket_path: &Path) -> bool {
    match read_pid(&pid_path(socket_path)) {
        Some(pid) => !process_alive(pid),
        None => true,
    }
}

/// Remove a stale socket and its PID file. Missing files are fine.
pub fn cleanup(socket_path: &Path) {
    let _ = std::fs::remove_file(socket_path);
    let _ = std::fs::remove_file(pid_path(socket_path));
}

/// Write this process's PID beside the socket.
pub fn write_pid_file(socket_path: &Path) -> std::io::Result<()> {
    std::fs::write(pid_path(socket_path), std::process::id().to_string())
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
