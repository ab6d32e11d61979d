// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use super::*;

#[test]
fn socket_path_is_deterministic() {
    let a = socket_path(Path::new("/home/user/project"));
    let b = socket_path(Path::new("/home/user/project"));
    assert_eq!(a, b);
}

#[test]
fn socket_path_differs_per_project() {
    let a = socket_path(Path::new("/home/user/project-a"));
    let b = socket_path(Path::new("/home/user/project-b"));
    assert_ne!(a, b);
}

#[test]
fn socket_path_shape() {
    let path = socket_path(Path::new("/srv/thing"));
    let s = path.to_string_lossy();
    assert!(s.starts_with("/tmp/claude-bus-"), "got: {s}");
    assert!(s.ends_with(".sock"), "got: {s}");
    // prefix + 8 hex chars + suffix
    let hash = &s["/tmp/claude-bus-".len()..s.len() - ".sock".len()];
    assert_eq!(hash.len(), 8);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn pid_and_log_paths_append_suffixes() {
    let sock = Path::new("/tmp/claude-bus-abcd1234.sock");
    assert_eq!(
        pid_path(sock),
        Path::new("/tmp/claude-bus-abcd1234.sock.pid")
    );
    assert_eq!(
        log_path(sock),
        Path::new("/tmp/claude-bus-abcd1234.sock.log")
    );
}

#[test]
fn read_pid_requires_positive_integer() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("daemon.pid");

    assert_eq!(read_pid(&pid_file), None); // absent

    std::fs::write(&pid_file, "not-a-pid").unwrap();
    assert_eq!(read_pid(&pid_file), None);

    std::fs::write(&pid_file, "0").unwrap();
    assert_eq!(read_pid(&pid_file), None);

    std::fs::write(&pid_file, "-4").unwrap();
    assert_eq!(read_pid(&pid_file), None);

    std::fs::write(&pid_file, "12345\n").unwrap();
    assert_eq!(read_pid(&pid_file), Some(12345));
}

#[test]
fn own_process_is_alive() {
    assert!(process_alive(std::process::id()));
}

#[test]
fn nonexistent_process_is_dead() {
    // Far above any default pid_max.
    assert!(!process_alive(99_999_999));
}

#[test]
fn stale_when_pid_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    std::fs::write(&sock, "").unwrap();
    assert!(is_stale(&sock));
}

#[test]
fn stale_when_pid_file_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    std::fs::write(pid_path(&sock), "over 9000").unwrap();
    assert!(is_stale(&sock));
}

#[test]
fn stale_when_process_dead() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    std::fs::write(pid_path(&sock), "99999999").unwrap();
    assert!(is_stale(&sock));
}

#[test]
fn live_when_process_exists() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    std::fs::write(pid_path(&sock), std::process::id().to_string()).unwrap();
    assert!(!is_stale(&sock));
}

#[test]
fn cleanup_removes_socket_and_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    std::fs::write(&sock, "").unwrap();
    std::fs::write(pid_path(&sock), "1").unwrap();

    cleanup(&sock);
    assert!(!sock.exists());
    assert!(!pid_path(&sock).exists());

    // idempotent on missing files
    cleanup(&sock);
}

#[test]
fn write_pid_file_records_current_process() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("bus.sock");
    write_pid_file(&sock).unwrap();
    assert_eq!(read_pid(&pid_path(&sock)), Some(std::process::id()));
}
