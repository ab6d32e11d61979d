// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bead Bus Daemon (beadbusd)
//!
//! Per-project background process that owns worker and queue state and
//! dispatches beads over a Unix socket. Usually started through
//! `beadbus serve`, which degrades to a client when a daemon already owns
//! the project's socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use tracing::error;

use beadbus_daemon::{lifecycle, socket, Config, LifecycleError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let project_root = match parse_args(std::env::args().skip(1)) {
        Ok(ParsedArgs::Run { project_root }) => project_root,
        Ok(ParsedArgs::Version) => {
            println!("beadbusd {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Ok(ParsedArgs::Help) => {
            print_help();
            return Ok(());
        }
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("Usage: beadbusd [--project <path>] [--help | --version]");
            std::process::exit(1);
        }
    };

    let project_root = match project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let config = Config::for_project(project_root);

    rotate_log_if_needed(&config.log_path);
    let _log_guard = setup_logging(&config)?;

    let unix_listener = match lifecycle::startup(&config) {
        Ok(listener) => listener,
        Err(LifecycleError::AlreadyRunning(path)) => {
            let pid = socket::read_pid(&config.pid_path)
                .map(|p| p.to_string())
                .unwrap_or_default();
            eprintln!("beadbusd is already running for this project");
            eprintln!("  socket: {}", path.display());
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(LifecycleError::AddressInUse(path)) => {
            // a concurrent starter won the bind race; callers that can act
            // as clients should do so against the winner's socket
            eprintln!("lost startup race for {}", path.display());
            std::process::exit(2);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    // Signal ready for the parent process waiting on startup
    println!("READY");

    lifecycle::run(config, unix_listener).await?;
    Ok(())
}

enum ParsedArgs {
    Run { project_root: Option<PathBuf> },
    Version,
    Help,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<ParsedArgs, String> {
    let mut project_root = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => return Ok(ParsedArgs::Version),
            "--help" | "-h" | "help" => return Ok(ParsedArgs::Help),
            "--project" => match args.next() {
                Some(path) => project_root = Some(PathBuf::from(path)),
                None => return Err("--project requires a path".to_string()),
            },
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(ParsedArgs::Run { project_root })
}

fn print_help() {
    println!("beadbusd {}", env!("CARGO_PKG_VERSION"));
    println!("Bead Bus Daemon - coordinates bead dispatch to polling workers");
    println!();
    println!("USAGE:");
    println!("    beadbusd [--project <path>]");
    println!();
    println!("The daemon is typically started by `beadbus serve` and should not");
    println!("be invoked directly. It listens on a per-project Unix socket for");
    println!("newline-delimited JSON requests.");
    println!();
    println!("OPTIONS:");
    println!("    --project <path>  Project root (default: current directory)");
    println!("    -h, --help        Print help information");
    println!("    -V, --version     Print version information");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `x.log` -> `x.log.1` -> `x.log.2` -> `x.log.3`, deleting the
/// oldest. Best-effort: rotation failures do not block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config
        .log_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("/tmp"));
    let file_name = config
        .log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "beadbusd.log".into());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
