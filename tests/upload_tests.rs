//! Upload protocol tests against an in-process WebSocket server.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use kitclass::config::UploadSettings;
use kitclass::upload::{ServerMessage, UploadEvent, UploadState};
use kitclass::{UploadClient, UploadError};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

/// What the server saw from the client.
#[derive(Debug, Default)]
struct Transcript {
    messages: Vec<Value>,
    close: Option<(CloseCode, String)>,
}

impl Transcript {
    fn actions(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter_map(|m| m["action"].as_str())
            .collect()
    }

    fn chunks(&self) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|m| m["action"] == "upload_chunk")
            .collect()
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    /// Ack every chunk, answer `complete_upload` with an analysis.
    Complete,
    /// Answer `init_upload` with an error.
    RejectInit,
    /// Reply with a non-JSON text frame after init.
    Garbage,
    /// Close the socket after this many chunks.
    CloseAfter(usize),
}

async fn spawn_server(behavior: Behavior) -> (String, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut transcript = Transcript::default();

        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    let action = value["action"].as_str().unwrap_or_default().to_string();
                    transcript.messages.push(value);

                    let reply = match (behavior, action.as_str()) {
                        (Behavior::RejectInit, "init_upload") => Some(
                            json!({"type": "error", "message": "Unsupported file type"})
                                .to_string(),
                        ),
                        (Behavior::Garbage, "init_upload") => Some("not json".to_string()),
                        (_, "init_upload") => {
                            Some(json!({"type": "start", "message": "Receiving file"}).to_string())
                        }
                        (Behavior::CloseAfter(n), "upload_chunk")
                            if transcript.chunks().len() == n =>
                        {
                            let _ = ws.close(None).await;
                            None
                        }
                        (_, "upload_chunk") => Some(json!({"type": "chunk_received"}).to_string()),
                        (_, "complete_upload") => Some(
                            json!({"type": "complete", "content": "Strong projects section"})
                                .to_string(),
                        ),
                        _ => None,
                    };

                    if let Some(reply) = reply {
                        if ws.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(frame) => {
                    transcript.close = frame.map(|f| (f.code, f.reason.to_string()));
                    break;
                }
                _ => {}
            }
        }
        transcript
    });

    (format!("ws://{addr}"), handle)
}

fn client(url: String, chunk_size: usize) -> UploadClient {
    UploadClient::new(&UploadSettings {
        url,
        chunk_size,
        send_delay_ms: 5,
        connect_timeout_secs: 1,
        response_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn sends_ordered_chunks_then_one_complete() {
    let (url, server) = spawn_server(Behavior::Complete).await;
    // Non-UTF-8 bytes, as in a PDF.
    let bytes: Vec<u8> = (0..=255u8).rev().cycle().take(500).collect();
    let encoded_len = STANDARD.encode(&bytes).len();
    let chunk_size = 64;

    let (tx, mut rx) = mpsc::channel(256);
    let analysis = client(url, chunk_size)
        .upload_bytes("cv.pdf", &bytes, Some(tx))
        .await
        .unwrap();
    assert_eq!(analysis, "Strong projects section");

    let transcript = server.await.unwrap();
    let expected_chunks = encoded_len.div_ceil(chunk_size);

    let actions = transcript.actions();
    assert_eq!(actions.first(), Some(&"init_upload"));
    assert_eq!(actions.last(), Some(&"complete_upload"));
    assert_eq!(actions.iter().filter(|a| **a == "complete_upload").count(), 1);

    let init = &transcript.messages[0];
    assert_eq!(init["totalChunks"], expected_chunks);
    assert_eq!(init["fileSize"], 500);
    assert_eq!(init["filename"], "cv.pdf");

    let chunks = transcript.chunks();
    assert_eq!(chunks.len(), expected_chunks);
    let indices: Vec<u64> = chunks.iter().map(|c| c["chunkIndex"].as_u64().unwrap()).collect();
    assert_eq!(indices, (0..expected_chunks as u64).collect::<Vec<_>>());

    let content: String = chunks.iter().map(|c| c["content"].as_str().unwrap()).collect();
    assert_eq!(STANDARD.decode(content).unwrap(), bytes);

    let (code, reason) = transcript.close.unwrap();
    assert_eq!(code, CloseCode::Normal);
    assert_eq!(reason, "Upload complete");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&UploadEvent::State(UploadState::Connecting)));
    assert_eq!(
        events.last(),
        Some(&UploadEvent::State(UploadState::Closed { success: true }))
    );
    assert!(events.contains(&UploadEvent::Server(ServerMessage::Start {
        message: "Receiving file".into()
    })));
    assert!(events.contains(&UploadEvent::State(UploadState::Completing)));
}

#[tokio::test]
async fn server_error_closes_with_reason() {
    let (url, server) = spawn_server(Behavior::RejectInit).await;

    let err = client(url, 64)
        .upload_bytes("cv.doc", b"plain resume", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Server(ref m) if m == "Unsupported file type"));

    let transcript = server.await.unwrap();
    assert!(!transcript.actions().contains(&"complete_upload"));
    let (code, reason) = transcript.close.unwrap();
    assert_eq!(code, CloseCode::Normal);
    assert_eq!(reason, "Server reported error");
}

#[tokio::test]
async fn malformed_message_ends_upload() {
    let (url, server) = spawn_server(Behavior::Garbage).await;

    let err = client(url, 64)
        .upload_bytes("cv.txt", &[b'a'; 300], None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Malformed(_)));

    let transcript = server.await.unwrap();
    let (code, reason) = transcript.close.unwrap();
    assert_eq!(code, CloseCode::Normal);
    assert_eq!(reason, "Malformed server message");
}

#[tokio::test]
async fn closed_connection_stops_chunks() {
    let (url, server) = spawn_server(Behavior::CloseAfter(2)).await;

    let err = client(url, 16)
        .upload_bytes("cv.pdf", &[1u8; 600], None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::NotOpen { .. }));

    let transcript = server.await.unwrap();
    assert!(transcript.chunks().len() < 50);
    assert!(!transcript.actions().contains(&"complete_upload"));
}

#[tokio::test]
async fn handshake_timeout_aborts() {
    // Accepts TCP but never answers the WebSocket handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let err = client(format!("ws://{addr}"), 64)
        .upload_bytes("cv.pdf", b"data", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ConnectTimeout(d) if d == Duration::from_secs(1)));
}

#[tokio::test]
async fn reads_file_from_disk() {
    let (url, server) = spawn_server(Behavior::Complete).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.pdf");
    tokio::fs::write(&path, b"%PDF-1.7\n\x00\xff binary").await.unwrap();

    let analysis = client(url, 8).upload_file(&path, None).await.unwrap();
    assert_eq!(analysis, "Strong projects section");

    let transcript = server.await.unwrap();
    assert_eq!(transcript.messages[0]["filename"], "resume.pdf");
}
