//! Error types for the course player and upload client.

use thiserror::Error;

/// Generic guidance shown to the viewer when a CV upload fails.
pub const UPLOAD_RETRY_MESSAGE: &str =
    "Something went wrong while uploading your CV. Please try again in a moment.";

/// Errors from the request/response HTTP endpoints.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Viewer identity is required for {0}")]
    MissingIdentity(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Inline message rendered in place of the failed content.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => {
                "We couldn't reach the server. Check your connection and try again.".into()
            }
            ClientError::Status { status, .. } if *status == 404 => {
                "We couldn't find what you were looking for.".into()
            }
            ClientError::Status { .. } => {
                "The server returned an error. Please try again later.".into()
            }
            ClientError::MissingIdentity(_) => "Please sign in to continue.".into(),
            ClientError::InvalidRequest(reason) => reason.clone(),
        }
    }
}

/// Errors that end a chunked upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid upload URL: {0}")]
    InvalidUrl(String),

    #[error("Connection not established within {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("Failed to connect: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Connection is not open, chunk {chunk_index} was not sent")]
    NotOpen { chunk_index: usize },

    #[error("Connection closed before the upload completed")]
    ClosedMidStream,

    #[error("Server reported an error: {0}")]
    Server(String),

    #[error("Malformed server message: {0}")]
    Malformed(String),

    #[error("No response from server within {0:?}")]
    ResponseTimeout(std::time::Duration),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl UploadError {
    /// Message shown to the viewer; every upload failure offers a retry.
    pub fn user_message(&self) -> &'static str {
        UPLOAD_RETRY_MESSAGE
    }
}

/// Errors while opening a course session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to load lessons: {0}")]
    Lessons(#[from] ClientError),

    #[error("Course {0} has no lessons")]
    NoLessons(String),
}

impl SessionError {
    /// Inline message rendered in place of the course player.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Lessons(e) => e.user_message(),
            SessionError::NoLessons(_) => "No lessons are available for this course yet.".into(),
        }
    }
}
