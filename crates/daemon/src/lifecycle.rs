// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, singleton acquisition, shutdown.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};

use beadbus_adapters::BdCliTracker;
use beadbus_core::SystemClock;

use crate::dispatch::Engine;
use crate::listener::{Listener, SHUTDOWN_DRAIN};
use crate::socket;

/// Daemon configuration: one socket per project root.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the project this daemon coordinates
    pub project_root: PathBuf,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Path to the PID file
    pub pid_path: PathBuf,
    /// Path to the daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Derive paths for a project root.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        let project_root = root.into();
        let socket_path = socket::socket_path(&project_root);
        Self {
            pid_path: socket::pid_path(&socket_path),
            log_path: socket::log_path(&socket_path),
            socket_path,
            project_root,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A live daemon already owns this project's socket.
    #[error("daemon already running (live socket at {0})")]
    AlreadyRunning(PathBuf),

    /// Lost a bind race to another starter. Distinct from other bind
    /// failures so the CLI can degrade to client mode.
    #[error("socket {0} is already bound")]
    AddressInUse(PathBuf),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Acquire the per-project singleton socket.
///
/// Stale leftovers (dead or unreadable PID) are cleaned up first; a live
/// socket refuses startup. Between the stale check and the bind another
/// starter may win the race, which surfaces as [`LifecycleError::AddressInUse`].
/// A socket the stale check declared live is never unlinked.
pub fn startup(config: &Config) -> Result<UnixListener, LifecycleError> {
    if config.socket_path.exists() {
        if socket::is_stale(&config.socket_path) {
            info!(socket = %config.socket_path.display(), "removing stale socket");
            socket::cleanup(&config.socket_path);
        } else {
            return Err(LifecycleError::AlreadyRunning(config.socket_path.clone()));
        }
    }

    let listener = bind_socket(&config.socket_path)?;

    // owner-only before anything can connect
    std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600))?;
    socket::write_pid_file(&config.socket_path)?;

    info!(
        socket = %config.socket_path.display(),
        project = %config.project_root.display(),
        "daemon started"
    );
    Ok(listener)
}

fn bind_socket(path: &Path) -> Result<UnixListener, LifecycleError> {
    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            Err(LifecycleError::AddressInUse(path.to_path_buf()))
        }
        Err(e) => Err(LifecycleError::BindFailed(path.to_path_buf(), e)),
    }
}

/// Remove the socket and PID file. Safe to call repeatedly.
pub fn shutdown_cleanup(config: &Config) {
    socket::cleanup(&config.socket_path);
}

/// Run the daemon on an acquired listener until SIGTERM/SIGINT.
///
/// Shutdown order: stop accepting and notify clients, unblock suspended
/// polls, give clients a drain window, then remove socket and PID file.
pub async fn run(config: Config, unix_listener: UnixListener) -> Result<(), LifecycleError> {
    let engine = Arc::new(Engine::new(BdCliTracker::new(), SystemClock));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(Listener::new(unix_listener, Arc::clone(&engine), shutdown_rx).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("daemon ready, listening on {}", config.socket_path.display());

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    if shutdown_tx.send(true).is_err() {
        warn!("listener already gone at shutdown");
    }
    engine.cancel_pollers().await;
    tokio::time::sleep(SHUTDOWN_DRAIN).await;

    shutdown_cleanup(&config);
    info!("daemon stopped");
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
