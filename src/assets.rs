//! Thumbnail and stream URL resolution for lessons.
//!
//! Pure URL composition over the video CDN; no network calls.

use crate::lessons::Lesson;
use crate::playback::PlaybackTokens;

/// CDN assets available for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Thumbnail,
    Manifest,
}

impl AssetType {
    /// Path of the asset under a video's CDN directory.
    pub fn path(&self) -> &'static str {
        match self {
            AssetType::Thumbnail => "thumbnails/thumbnail.jpg",
            AssetType::Manifest => "manifest/video.m3u8",
        }
    }
}

/// What the player can show for a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSource {
    /// Playable stream.
    Stream {
        manifest_url: String,
        thumbnail_url: String,
    },
    /// No playable source; only the preview (if any) is rendered.
    ThumbnailOnly { thumbnail_url: Option<String> },
}

impl PlaybackSource {
    /// Check if there is a stream to play.
    pub fn is_playable(&self) -> bool {
        matches!(self, PlaybackSource::Stream { .. })
    }

    /// Get the manifest URL of a playable stream.
    pub fn manifest_url(&self) -> Option<&str> {
        match self {
            PlaybackSource::Stream { manifest_url, .. } => Some(manifest_url),
            PlaybackSource::ThumbnailOnly { .. } => None,
        }
    }

    /// Get the preview image URL, if any.
    pub fn thumbnail_url(&self) -> Option<&str> {
        match self {
            PlaybackSource::Stream { thumbnail_url, .. } => Some(thumbnail_url),
            PlaybackSource::ThumbnailOnly { thumbnail_url } => thumbnail_url.as_deref(),
        }
    }
}

/// Builds CDN URLs. Private videos are addressed by their signed token in
/// place of the video id.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    stream_base: String,
}

impl MediaResolver {
    /// Create a new resolver. A trailing slash on `stream_base` is dropped.
    pub fn new(stream_base: impl Into<String>) -> Self {
        let stream_base = stream_base.into();
        Self {
            stream_base: stream_base.trim_end_matches('/').to_string(),
        }
    }

    /// URL of `asset`, or `None` for a private video without a token.
    pub fn asset_url(
        &self,
        asset: AssetType,
        video_id: &str,
        is_private: bool,
        token: Option<&str>,
    ) -> Option<String> {
        let id = if is_private { token? } else { video_id };
        Some(format!(
            "{}/{}/{}",
            self.stream_base,
            urlencoding::encode(id),
            asset.path()
        ))
    }

    /// Thumbnail URL for a video, `None` for a private video without a token.
    pub fn thumbnail_url(
        &self,
        video_id: &str,
        is_private: bool,
        token: Option<&str>,
    ) -> Option<String> {
        self.asset_url(AssetType::Thumbnail, video_id, is_private, token)
    }

    /// HLS manifest URL for a video, `None` for a private video without a token.
    pub fn manifest_url(
        &self,
        video_id: &str,
        is_private: bool,
        token: Option<&str>,
    ) -> Option<String> {
        self.asset_url(AssetType::Manifest, video_id, is_private, token)
    }

    /// Resolve what to render for `lesson`.
    pub fn source(&self, lesson: &Lesson, tokens: &PlaybackTokens) -> PlaybackSource {
        let token = tokens.get(&lesson.video_id);
        let thumbnail = self.thumbnail_url(&lesson.video_id, lesson.is_private, token);
        let manifest = self.manifest_url(&lesson.video_id, lesson.is_private, token);

        match (manifest, thumbnail) {
            (Some(manifest_url), Some(thumbnail_url)) => PlaybackSource::Stream {
                manifest_url,
                thumbnail_url,
            },
            (_, thumbnail_url) => PlaybackSource::ThumbnailOnly { thumbnail_url },
        }
    }
}
