// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground `serve` mode with startup race resolution.
//!
//! Several processes may decide to serve the same project at once. The
//! rules: whoever connects to a live daemon becomes a client; whoever
//! loses the bind race becomes a client; exactly one starter ends up
//! serving.

use std::path::PathBuf;

use tokio::net::UnixStream;

use beadbus_daemon::{lifecycle, Config, LifecycleError};

/// Run the daemon in the foreground, degrading to client mode when a
/// daemon already owns the project's socket. Returns the exit code.
pub async fn serve(project_root: PathBuf) -> i32 {
    let config = Config::for_project(project_root);

    // client-first: a live daemon means there is nothing to start
    if UnixStream::connect(&config.socket_path).await.is_ok() {
        println!(
            "beadbus daemon already running at {}",
            config.socket_path.display()
        );
        return 0;
    }

    match lifecycle::startup(&config) {
        Ok(listener) => {
            init_logging();
            println!("READY");
            match lifecycle::run(config, listener).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("daemon error: {e}");
                    1
                }
            }
        }
        Err(LifecycleError::AddressInUse(path)) => {
            // lost the race; the winner serves this project
            println!("beadbus daemon already running at {}", path.display());
            0
        }
        Err(e) => {
            eprintln!("failed to start daemon: {e}");
            1
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
