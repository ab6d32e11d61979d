// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;

use super::*;

/// Config pointing into a temp dir instead of /tmp.
fn temp_config() -> (Config, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bus.sock");
    let config = Config {
        project_root: dir.path().to_path_buf(),
        pid_path: socket::pid_path(&socket_path),
        log_path: socket::log_path(&socket_path),
        socket_path,
    };
    (config, dir)
}

#[test]
fn config_derives_paths_from_the_project_root() {
    let config = Config::for_project("/srv/project");
    let s = config.socket_path.to_string_lossy().to_string();
    assert!(s.starts_with("/tmp/claude-bus-"));
    assert_eq!(
        config.pid_path.to_string_lossy(),
        format!("{s}.pid")
    );
    assert_eq!(
        config.log_path.to_string_lossy(),
        format!("{s}.log")
    );
}

#[tokio::test]
async fn startup_binds_chmods_and_writes_pid() {
    let (config, _dir) = temp_config();
    let _listener = startup(&config).unwrap();

    assert!(config.socket_path.exists());
    let mode = std::fs::metadata(&config.socket_path)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(
        socket::read_pid(&config.pid_path),
        Some(std::process::id())
    );
}

#[tokio::test]
async fn startup_refuses_a_live_socket() {
    let (config, _dir) = temp_config();
    let _listener = startup(&config).unwrap();

    let err = startup(&config).unwrap_err();
    assert!(
        matches!(err, LifecycleError::AlreadyRunning(_)),
        "got: {err:?}"
    );
    // the live socket was not unlinked
    assert!(config.socket_path.exists());
}

#[tokio::test]
async fn startup_cleans_a_stale_socket_and_binds() {
    let (config, _dir) = temp_config();

    // leftover socket file with a dead pid
    std::fs::write(&config.socket_path, "").unwrap();
    std::fs::write(&config.pid_path, "99999999").unwrap();

    let _listener = startup(&config).unwrap();
    assert_eq!(
        socket::read_pid(&config.pid_path),
        Some(std::process::id())
    );
}

#[tokio::test]
async fn startup_cleans_a_socket_without_a_pid_file() {
    let (config, _dir) = temp_config();
    std::fs::write(&config.socket_path, "").unwrap();

    let _listener = startup(&config).unwrap();
    assert!(config.socket_path.exists());
}

#[tokio::test]
async fn losing_the_bind_race_is_reported_distinctly() {
    let (config, _dir) = temp_config();

    // another starter bound between our stale check and bind: simulate by
    // holding the socket while the pid file points at a dead process, so
    // the stale check passes but the unlink-and-bind happens against a
    // racing listener
    let _winner = tokio::net::UnixListener::bind(&config.socket_path).unwrap();
    let err = super::bind_socket(&config.socket_path).unwrap_err();
    assert!(
        matches!(err, LifecycleError::AddressInUse(_)),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn shutdown_cleanup_removes_socket_and_pid() {
    let (config, _dir) = temp_config();
    let listener = startup(&config).unwrap();
    drop(listener);

    shutdown_cleanup(&config);
    assert!(!config.socket_path.exists());
    assert!(!config.pid_path.exists());

    // idempotent
    shutdown_cleanup(&config);
}
