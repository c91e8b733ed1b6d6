//! Per-video playback tokens for private lessons.

use crate::context::ViewerContext;
use crate::error::ClientError;
use crate::lessons::Lesson;
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Tokens keyed by video id. Lives as long as the course page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackTokens(HashMap<String, String>);

impl PlaybackTokens {
    /// Get the token for `video_id`.
    pub fn get(&self, video_id: &str) -> Option<&str> {
        self.0.get(video_id).map(String::as_str)
    }

    /// Store the token for `video_id`, replacing any previous one.
    pub fn insert(&mut self, video_id: impl Into<String>, token: impl Into<String>) {
        self.0.insert(video_id.into(), token.into());
    }

    /// Number of authorized videos.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no video is authorized.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Exchanges the viewer identity for short-lived playback tokens.
#[derive(Debug, Clone)]
pub struct PlaybackAuthorizer {
    client: Client,
    url: String,
}

impl PlaybackAuthorizer {
    /// Create a new authorizer for the token endpoint at `url`.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Request a token for one video.
    pub async fn token(&self, email: &str, video_id: &str) -> Result<String, ClientError> {
        let res = self
            .client
            .get(&self.url)
            .query(&[("email", email), ("videoId", video_id)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::Status {
                status: res.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let body: TokenResponse = res.json().await?;
        Ok(body.token)
    }

    /// Fetch tokens for every private lesson concurrently.
    ///
    /// Failures are logged and leave the lesson without a token, which the
    /// player renders as thumbnail-only.
    pub async fn authorize(&self, ctx: &ViewerContext, lessons: &[Lesson]) -> PlaybackTokens {
        let mut tokens = PlaybackTokens::default();

        let private: Vec<&Lesson> = lessons.iter().filter(|l| l.is_private).collect();
        if private.is_empty() {
            return tokens;
        }

        let Some(email) = ctx.email() else {
            tracing::error!(
                "No viewer email, skipping token fetch for {} private lessons",
                private.len()
            );
            return tokens;
        };

        let results = join_all(private.iter().map(|lesson| async move {
            (lesson.video_id.as_str(), self.token(email, &lesson.video_id).await)
        }))
        .await;

        for (video_id, result) in results {
            match result {
                Ok(token) => tokens.insert(video_id, token),
                Err(e) => tracing::warn!("Failed to fetch playback token for {}: {}", video_id, e),
            }
        }

        tracing::debug!("Authorized {}/{} private lessons", tokens.len(), private.len());
        tokens
    }
}
