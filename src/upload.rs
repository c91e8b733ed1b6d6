//! Chunked CV upload over a WebSocket.
//!
//! One connection per attempt: `init_upload`, then one `upload_chunk` per
//! base64 slice with a fixed delay between sends, then `complete_upload`.
//! The server pushes status messages at any time; `complete` carries the
//! analysis and ends the upload.

use crate::config::UploadSettings;
use crate::error::UploadError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

/// Messages sent by the client, tagged by `action`.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum ClientMessage<'a> {
    InitUpload {
        filename: &'a str,
        total_chunks: usize,
        file_size: u64,
    },
    UploadChunk {
        chunk_index: usize,
        total_chunks: usize,
        content: &'a str,
        filename: &'a str,
    },
    CompleteUpload {
        filename: &'a str,
    },
}

/// Messages pushed by the server, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server accepted `init_upload`.
    Start {
        #[serde(default)]
        message: String,
    },
    /// Server stored a chunk.
    ChunkReceived {
        #[serde(default, rename = "chunkIndex")]
        chunk_index: Option<usize>,
    },
    /// Analysis of the uploaded file. Ends the upload.
    Complete {
        content: String,
    },
    /// Server rejected the upload.
    Error {
        message: String,
    },
}

/// Connection lifecycle of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Opening the socket.
    Connecting,
    /// Socket open, `init_upload` sent next.
    Open,
    /// Sending chunk `index` of `total`.
    Sending { index: usize, total: usize },
    /// `complete_upload` sent, waiting for the analysis.
    Completing,
    /// Socket closed.
    Closed { success: bool },
}

/// Progress reported to the view while an upload runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Connection state changed.
    State(UploadState),
    /// Message pushed by the server.
    Server(ServerMessage),
}

/// A file prepared for sending: base64 text split into fixed-size slices.
#[derive(Debug, Clone)]
pub struct UploadSession {
    filename: String,
    file_size: u64,
    encoded: String,
    chunk_size: usize,
}

impl UploadSession {
    /// Encode the raw bytes; binary formats are preserved.
    pub fn new(filename: impl Into<String>, bytes: &[u8], chunk_size: usize) -> Self {
        Self {
            filename: filename.into(),
            file_size: bytes.len() as u64,
            encoded: STANDARD.encode(bytes),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Get the file name sent with every message.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size of the raw file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of slices, `ceil(encoded length / chunk size)`.
    pub fn total_chunks(&self) -> usize {
        self.encoded.len().div_ceil(self.chunk_size)
    }

    /// Slices of the encoded content in send order.
    pub fn chunks(&self) -> impl Iterator<Item = &str> + '_ {
        let len = self.encoded.len();
        // base64 output is ASCII, so any byte offset is a char boundary.
        (0..len)
            .step_by(self.chunk_size)
            .map(move |start| &self.encoded[start..(start + self.chunk_size).min(len)])
    }
}

/// Uploads files to the CV analysis channel.
#[derive(Debug, Clone)]
pub struct UploadClient {
    url: Url,
    chunk_size: usize,
    send_delay: Duration,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl UploadClient {
    /// Create a new client. The URL must be `ws://` or `wss://`.
    pub fn new(settings: &UploadSettings) -> Result<Self, UploadError> {
        let url = Url::parse(&settings.url).map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(UploadError::InvalidUrl(format!(
                "expected ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            chunk_size: settings.chunk_size,
            send_delay: settings.send_delay(),
            connect_timeout: settings.connect_timeout(),
            response_timeout: settings.response_timeout(),
        })
    }

    /// Read `path` and upload it. Returns the server's analysis.
    pub async fn upload_file(
        &self,
        path: &Path,
        events: Option<mpsc::Sender<UploadEvent>>,
    ) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        self.upload_bytes(&filename, &bytes, events).await
    }

    /// Upload in-memory content as `filename`. Returns the server's analysis.
    pub async fn upload_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
        events: Option<mpsc::Sender<UploadEvent>>,
    ) -> Result<String, UploadError> {
        let session = UploadSession::new(filename, bytes, self.chunk_size);
        let events = Events(events);

        tracing::info!(
            "Uploading {} ({} bytes, {} chunks)",
            session.filename(),
            session.file_size(),
            session.total_chunks()
        );

        let result = self.connect_and_upload(&session, &events).await;

        match &result {
            Ok(_) => tracing::info!("Upload of {} complete", session.filename()),
            Err(e) => tracing::error!("Upload of {} failed: {}", session.filename(), e),
        }
        events
            .send(UploadEvent::State(UploadState::Closed {
                success: result.is_ok(),
            }))
            .await;

        result
    }

    async fn connect_and_upload(
        &self,
        session: &UploadSession,
        events: &Events,
    ) -> Result<String, UploadError> {
        events.send(UploadEvent::State(UploadState::Connecting)).await;
        tracing::debug!("Connecting to: {}", self.url);

        let connect = connect_async(self.url.as_str());
        let (ws_stream, _response) = match timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(UploadError::Connect(e)),
            Err(_) => return Err(UploadError::ConnectTimeout(self.connect_timeout)),
        };
        events.send(UploadEvent::State(UploadState::Open)).await;

        let (mut write, mut read) = ws_stream.split();
        let mut open = true;

        let result = self
            .run(session, &mut write, &mut read, &mut open, events)
            .await;

        if open {
            let reason = close_reason(&result);
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: Cow::Borrowed(reason),
            };
            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                tracing::debug!("Failed to send close frame: {}", e);
            }
        }

        result
    }

    /// Drive the protocol until the server completes, fails, or the socket
    /// goes away. `open` is cleared once the server has closed.
    async fn run<W, R>(
        &self,
        session: &UploadSession,
        write: &mut W,
        read: &mut R,
        open: &mut bool,
        events: &Events,
    ) -> Result<String, UploadError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let filename = session.filename();
        let total = session.total_chunks();

        send_json(
            write,
            &ClientMessage::InitUpload {
                filename,
                total_chunks: total,
                file_size: session.file_size(),
            },
        )
        .await
        .map_err(|_| UploadError::ClosedMidStream)?;

        let mut chunks = session.chunks().enumerate();
        let mut completing = false;

        let pacing = sleep(self.send_delay);
        tokio::pin!(pacing);
        let deadline = sleep(self.response_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                msg = read.next(), if *open => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let message: ServerMessage = serde_json::from_str(&text)
                                .map_err(|e| UploadError::Malformed(format!("{e}: {text}")))?;
                            tracing::debug!("Server message: {:?}", message);
                            events.send(UploadEvent::Server(message.clone())).await;

                            match message {
                                ServerMessage::Complete { content } => return Ok(content),
                                ServerMessage::Error { message } => {
                                    return Err(UploadError::Server(message));
                                }
                                ServerMessage::Start { .. }
                                | ServerMessage::ChunkReceived { .. } => {}
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if write.send(Message::Pong(data)).await.is_err() {
                                *open = false;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!("WebSocket closed by server: {:?}", frame);
                            *open = false;
                            if completing {
                                return Err(UploadError::ClosedMidStream);
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("WebSocket error: {}", e);
                            *open = false;
                            if completing {
                                return Err(UploadError::ClosedMidStream);
                            }
                        }
                        None => {
                            *open = false;
                            if completing {
                                return Err(UploadError::ClosedMidStream);
                            }
                        }
                    }
                }

                _ = &mut pacing, if !completing => {
                    if let Some((index, content)) = chunks.next() {
                        if !*open {
                            return Err(UploadError::NotOpen { chunk_index: index });
                        }

                        events
                            .send(UploadEvent::State(UploadState::Sending { index, total }))
                            .await;
                        let message = ClientMessage::UploadChunk {
                            chunk_index: index,
                            total_chunks: total,
                            content,
                            filename,
                        };
                        if let Err(e) = send_json(write, &message).await {
                            tracing::warn!("Failed to send chunk {}: {}", index, e);
                            *open = false;
                            return Err(UploadError::NotOpen { chunk_index: index });
                        }

                        pacing.as_mut().reset(Instant::now() + self.send_delay);
                    } else {
                        if !*open {
                            return Err(UploadError::ClosedMidStream);
                        }
                        send_json(write, &ClientMessage::CompleteUpload { filename })
                            .await
                            .map_err(|_| UploadError::ClosedMidStream)?;

                        completing = true;
                        deadline.as_mut().reset(Instant::now() + self.response_timeout);
                        events.send(UploadEvent::State(UploadState::Completing)).await;
                    }
                }

                _ = &mut deadline, if completing => {
                    return Err(UploadError::ResponseTimeout(self.response_timeout));
                }
            }
        }
    }
}

/// Reason text sent with the normal (1000) close frame.
fn close_reason(result: &Result<String, UploadError>) -> &'static str {
    match result {
        Ok(_) => "Upload complete",
        Err(UploadError::Server(_)) => "Server reported error",
        Err(UploadError::Malformed(_)) => "Malformed server message",
        Err(UploadError::ResponseTimeout(_)) => "No response from server",
        Err(_) => "Upload failed",
    }
}

async fn send_json<W>(write: &mut W, message: &ClientMessage<'_>) -> Result<(), UploadError>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|_| UploadError::ClosedMidStream)
}

/// Optional event sink; a dropped receiver is ignored.
struct Events(Option<mpsc::Sender<UploadEvent>>);

impl Events {
    async fn send(&self, event: UploadEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_is_ceil_of_encoded_length() {
        let bytes = vec![7u8; 100];
        let session = UploadSession::new("cv.pdf", &bytes, 30);
        // 100 bytes -> 136 base64 chars -> 5 slices of 30.
        assert_eq!(session.total_chunks(), 5);

        let lens: Vec<usize> = session.chunks().map(str::len).collect();
        assert_eq!(lens, vec![30, 30, 30, 30, 16]);
    }

    #[test]
    fn binary_content_survives_chunking() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let session = UploadSession::new("cv.pdf", &bytes, 64);
        assert_eq!(session.chunks().count(), session.total_chunks());
        let joined: String = session.chunks().collect();
        assert_eq!(STANDARD.decode(joined).unwrap(), bytes);
    }

    #[test]
    fn empty_file_has_no_chunks() {
        let session = UploadSession::new("empty.txt", &[], 16);
        assert_eq!(session.total_chunks(), 0);
        assert_eq!(session.chunks().next(), None);
        assert_eq!(session.file_size(), 0);
    }

    #[test]
    fn client_messages_use_wire_names() {
        let json = serde_json::to_value(ClientMessage::UploadChunk {
            chunk_index: 2,
            total_chunks: 4,
            content: "QUJD",
            filename: "cv.pdf",
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "upload_chunk",
                "chunkIndex": 2,
                "totalChunks": 4,
                "content": "QUJD",
                "filename": "cv.pdf"
            })
        );

        let json = serde_json::to_value(ClientMessage::InitUpload {
            filename: "cv.pdf",
            total_chunks: 4,
            file_size: 90,
        })
        .unwrap();
        assert_eq!(json["action"], "init_upload");
        assert_eq!(json["fileSize"], 90);
    }

    #[test]
    fn parses_server_messages() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"chunk_received","chunkIndex":1}"#).unwrap();
        assert_eq!(msg, ServerMessage::ChunkReceived { chunk_index: Some(1) });

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"complete","content":"Strong CV"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Complete { content: "Strong CV".into() });

        assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"progress"}"#).is_err());
    }

    #[test]
    fn rejects_http_url() {
        let settings = UploadSettings {
            url: "http://localhost:3001".into(),
            ..UploadSettings::default()
        };
        assert!(matches!(UploadClient::new(&settings), Err(UploadError::InvalidUrl(_))));
    }
}
