// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use super::*;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal scripted daemon: accepts one connection, reads one request,
/// answers with the frames produced by `respond`.
fn scripted_server(
    respond: impl Fn(serde_json::Value) -> Vec<String> + Send + 'static,
) -> (BusClient, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("bus.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        for frame in respond(request) {
            writer.write_all(format!("{frame}\n").as_bytes()).await.unwrap();
        }
        writer.flush().await.unwrap();
    });

    let client = BusClient {
        socket_path,
    };
    (client, dir)
}

#[tokio::test]
async fn returns_the_data_of_a_matching_response() {
    let (client, _dir) = scripted_server(|request| {
        let id = request["id"].as_str().unwrap().to_string();
        vec![json!({ "id": id, "success": true, "data": { "worker": "w1" } }).to_string()]
    });

    let data = client
        .call("register_worker", json!({ "name": "w1" }), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(data, json!({ "worker": "w1" }));
}

#[tokio::test]
async fn skips_frames_for_other_requests() {
    let (client, _dir) = scripted_server(|request| {
        let id = request["id"].as_str().unwrap().to_string();
        vec![
            json!({ "id": "someone-else", "success": true, "data": {} }).to_string(),
            json!({ "id": id, "success": true, "data": { "ours": true } }).to_string(),
        ]
    });

    let data = client.call("get_status", json!({}), TIMEOUT).await.unwrap();
    assert_eq!(data, json!({ "ours": true }));
}

#[tokio::test]
async fn surfaces_transport_errors_as_rejections() {
    let (client, _dir) = scripted_server(|request| {
        let id = request["id"].as_str().unwrap().to_string();
        vec![json!({
            "id": id,
            "success": false,
            "error": "UNKNOWN_TOOL",
            "message": "Unknown tool: frobnicate"
        })
        .to_string()]
    });

    let err = client
        .call("frobnicate", json!({}), TIMEOUT)
        .await
        .unwrap_err();
    match err {
        ClientError::Rejected { code, message } => {
            assert_eq!(code, "UNKNOWN_TOOL");
            assert_eq!(message, "Unknown tool: frobnicate");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_notice_aborts_the_request() {
    let (client, _dir) = scripted_server(|_| vec![json!({ "type": "shutdown" }).to_string()]);

    let err = client.call("get_status", json!({}), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ClientError::ShuttingDown), "got: {err:?}");
}

#[tokio::test]
async fn missing_socket_is_daemon_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let client = BusClient {
        socket_path: dir.path().join("absent.sock"),
    };
    let err = client.call("get_status", json!({}), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ClientError::DaemonNotRunning(_)), "got: {err:?}");
}

#[tokio::test]
async fn closed_connection_without_an_answer_is_an_error() {
    let (client, _dir) = scripted_server(|_| Vec::new());
    let err = client.call("get_status", json!({}), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed), "got: {err:?}");
}
