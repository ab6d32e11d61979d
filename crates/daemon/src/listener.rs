// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener accepts connections and spawns a task per client. Each
//! connection task runs a serial read loop: frames are handled in arrival
//! order and answered in completion order, which for a serial loop is the
//! same thing. A long-poll therefore occupies its connection, which is why
//! workers keep a dedicated connection for polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use beadbus_adapters::BeadTracker;
use beadbus_core::Clock;

use crate::dispatch::{Engine, HandlerError};
use crate::protocol::{parse_frame, ErrorCode, Notice, Response};
use crate::protocol_wire::{write_frame, LineBuffer, ProtocolError};

/// How long clients get to read the shutdown notice before connections are
/// torn down.
pub const SHUTDOWN_DRAIN: Duration = Duration::from_millis(100);

/// Listener task for accepting socket connections.
pub struct Listener<T, C> {
    socket: UnixListener,
    engine: Arc<Engine<T, C>>,
    shutdown: watch::Receiver<bool>,
}

impl<T, C> Listener<T, C>
where
    T: BeadTracker + 'static,
    C: Clock + 'static,
{
    pub fn new(
        socket: UnixListener,
        engine: Arc<Engine<T, C>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            socket,
            engine,
            shutdown,
        }
    }

    /// Accept connections until shutdown, spawning a task for each.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                result = self.socket.accept() => match result {
                    Ok((stream, _)) => {
                        let engine = Arc::clone(&self.engine);
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(async move {
                            match handle_connection(stream, engine, shutdown).await {
                                Ok(()) => debug!("client disconnected"),
                                Err(e) => warn!("connection error: {e}"),
                            }
                        });
                    }
                    Err(e) => error!("accept error: {e}"),
                },
                _ = self.shutdown.changed() => {
                    info!("listener stopping");
                    break;
                }
            }
        }
    }
}

/// Serve one client until it disconnects or the daemon shuts down.
async fn handle_connection<T, C>(
    stream: UnixStream,
    engine: Arc<Engine<T, C>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ProtocolError>
where
    T: BeadTracker + 'static,
    C: Clock + 'static,
{
    let (mut reader, mut writer) = stream.into_split();
    let mut lines = LineBuffer::new();
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            result = reader.read(&mut buf) => {
                let n = result?;
                if n == 0 {
                    return Ok(());
                }
                for line in lines.push(&buf[..n]) {
                    let response = process_frame(&line, &engine).await;
                    write_frame(&mut writer, &response).await?;
                }
            }
            _ = shutdown.changed() => {
                // best-effort notice, then give the client a moment to read
                let _ = write_frame(&mut writer, &Notice::Shutdown).await;
                tokio::time::sleep(SHUTDOWN_DRAIN).await;
                return Ok(());
            }
        }
    }
}

/// Turn one frame into one response. Never tears the connection down.
async fn process_frame<T, C>(line: &str, engine: &Arc<Engine<T, C>>) -> Response
where
    T: BeadTracker + 'static,
    C: Clock + 'static,
{
    let request = match parse_frame(line) {
        Ok(request) => request,
        Err(response) => {
            warn!(frame = line, "unparseable frame");
            return response;
        }
    };

    // status polling is frequent; keep it out of the info log
    if request.tool == "get_status" {
        debug!(id = %request.id, "received query");
    } else {
        info!(id = %request.id, tool = %request.tool, "received request");
    }

    match engine.handle(&request.tool, request.params).await {
        Ok(data) => Response::ok(request.id, data),
        Err(HandlerError::UnknownTool(tool)) => Response::error(
            request.id,
            ErrorCode::UnknownTool,
            format!("Unknown tool: {tool}"),
        ),
        Err(HandlerError::InvalidParams(message)) => {
            Response::error(request.id, ErrorCode::InvalidParams, message)
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
