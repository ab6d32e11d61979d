// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! beadbus: CLI client for the bead-bus coordination daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod args;
mod client;
mod env;
mod serve;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use beadbus_daemon::{socket, Config, DEFAULT_POLL_TIMEOUT_MS};

use crate::args::Command;
use crate::client::{BusClient, ClientError};

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match args::parse(&argv) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("Run 'beadbus help' for usage.");
            std::process::exit(2);
        }
    };

    let project_root = match invocation.project_root {
        Some(root) => root,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: cannot determine current directory: {e}");
                std::process::exit(1);
            }
        },
    };

    let code = run(invocation.command, project_root).await;
    std::process::exit(code);
}

async fn run(command: Command, project_root: PathBuf) -> i32 {
    match command {
        Command::Help => {
            print_help();
            0
        }
        Command::Version => {
            println!("beadbus {}", env!("CARGO_PKG_VERSION"));
            0
        }
        Command::Serve => serve::serve(project_root).await,
        Command::Stop => stop(&project_root).await,
        Command::Status => {
            match call_tool(&project_root, "get_status", json!({}), env::timeout_ipc()).await {
                Ok(data) => {
                    print_status(&data);
                    0
                }
                Err(code) => code,
            }
        }
        Command::Register { name } => {
            run_tool(&project_root, "register_worker", json!({ "name": name })).await
        }
        Command::Poll { name, timeout_ms } => {
            let timeout_ms = timeout_ms.unwrap_or(DEFAULT_POLL_TIMEOUT_MS);
            let read_timeout = Duration::from_millis(timeout_ms) + env::poll_margin();
            match call_tool(
                &project_root,
                "poll_task",
                json!({ "name": name, "timeout_ms": timeout_ms }),
                read_timeout,
            )
            .await
            {
                Ok(data) => print_data(&data),
                Err(code) => code,
            }
        }
        Command::Ack { worker, bead } => {
            run_tool(
                &project_root,
                "ack_task",
                json!({ "name": worker, "bead_id": bead }),
            )
            .await
        }
        Command::Submit { bead } => {
            run_tool(&project_root, "submit_task", json!({ "bead_id": bead })).await
        }
        Command::Done { bead } => {
            run_tool(&project_root, "worker_done", json!({ "bead_id": bead })).await
        }
        Command::Fail { bead, reason } => {
            run_tool(
                &project_root,
                "task_failed",
                json!({ "bead_id": bead, "reason": reason }),
            )
            .await
        }
        Command::Reset { worker } => {
            run_tool(
                &project_root,
                "reset_worker",
                json!({ "worker_name": worker }),
            )
            .await
        }
        Command::Retry { bead } => {
            run_tool(&project_root, "retry_task", json!({ "bead_id": bead })).await
        }
    }
}

/// Invoke a tool and pretty-print its data payload.
async fn run_tool(project_root: &Path, tool: &str, params: Value) -> i32 {
    match call_tool(project_root, tool, params, env::timeout_ipc()).await {
        Ok(data) => print_data(&data),
        Err(code) => code,
    }
}

async fn call_tool(
    project_root: &Path,
    tool: &str,
    params: Value,
    timeout: Duration,
) -> Result<Value, i32> {
    let client = BusClient::for_project(project_root);
    match client.call(tool, params, timeout).await {
        Ok(data) => Ok(data),
        Err(ClientError::DaemonNotRunning(path)) => {
            eprintln!("error: daemon not running (no socket at {})", path.display());
            eprintln!("Start it with 'beadbus serve'.");
            Err(1)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

/// Print a data payload; logical failures exit non-zero.
fn print_data(data: &Value) -> i32 {
    match serde_json::to_string_pretty(data) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{data}"),
    }
    let logical_failure = data.get("success").and_then(Value::as_bool) == Some(false)
        || (data.get("dispatched").is_some()
            && data.get("error").and_then(Value::as_str).is_some());
    if logical_failure {
        1
    } else {
        0
    }
}

/// Human-oriented rendering of a status snapshot.
fn print_status(data: &Value) {
    let workers = data["workers"].as_array().cloned().unwrap_or_default();
    if workers.is_empty() {
        println!("no workers registered");
    } else {
        println!("workers:");
        for w in &workers {
            let name = w["name"].as_str().unwrap_or("?");
            let status = w["status"].as_str().unwrap_or("?");
            let detail = match status {
                "executing" | "pending" => {
                    format!("  {}", w["current_task"].as_str().unwrap_or(""))
                }
                _ => match w["idle_seconds"].as_u64() {
                    Some(secs) => format!("  idle {secs}s"),
                    None => String::new(),
                },
            };
            println!("  {name:<20} {status:<10}{detail}");
        }
    }

    let queue = data["queue"].as_array().cloned().unwrap_or_default();
    let queued: Vec<&str> = queue.iter().filter_map(Value::as_str).collect();
    println!(
        "queued: {} [{}]",
        data["queued_tasks"].as_u64().unwrap_or(0),
        queued.join(", ")
    );
    println!(
        "polling: {}, pending: {}",
        data["polling_workers"].as_u64().unwrap_or(0),
        data["pending_workers"].as_u64().unwrap_or(0)
    );
}

/// Stop the project's daemon via SIGTERM, waiting for it to exit.
async fn stop(project_root: &Path) -> i32 {
    let config = Config::for_project(project_root.to_path_buf());
    let Some(pid) = socket::read_pid(&config.pid_path) else {
        eprintln!("no daemon running for this project");
        return 1;
    };

    if !kill_signal("-15", pid) {
        eprintln!("failed to signal pid {pid}");
        return 1;
    }

    let deadline = std::time::Instant::now() + env::timeout_exit();
    while std::time::Instant::now() < deadline {
        if !socket::process_alive(pid) {
            println!("daemon stopped");
            return 0;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    eprintln!("daemon (pid {pid}) did not exit in time");
    1
}

/// Execute kill with the given signal and PID.
fn kill_signal(sig: &str, pid: u32) -> bool {
    std::process::Command::new("kill")
        .args([sig, &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn print_help() {
    println!("beadbus {}", env!("CARGO_PKG_VERSION"));
    println!("CLI for the bead-bus coordination daemon");
    println!();
    println!("USAGE:");
    println!("    beadbus [--project <path>] <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("    serve                      Run the daemon (or attach if one is live)");
    println!("    stop                       Stop the project's daemon");
    println!("    status                     Show workers and queue");
    println!("    register <name>            Register a worker");
    println!("    poll <name> [timeout_ms]   Long-poll for the worker's next task");
    println!("    ack <worker> <bead>        Acknowledge a pending task");
    println!("    submit <bead>              Dispatch or queue a bead");
    println!("    done <bead>                Report a bead completed");
    println!("    fail <bead> <reason...>    Report a bead blocked");
    println!("    reset <worker>             Force a worker back to idle");
    println!("    retry <bead>               Re-dispatch a known bead");
    println!();
    println!("OPTIONS:");
    println!("    --project <path>   Project root (default: current directory)");
    println!("    -h, --help         Print help information");
    println!("    -V, --version      Print version information");
}
