//! Runtime configuration.
//!
//! Values come from built-in defaults, an optional TOML file and `KITCLASS_*`
//! environment variables, in increasing priority.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub cdn: CdnSettings,
    pub player: PlayerSettings,
    pub upload: UploadSettings,
    pub logging: LoggingSettings,
}

/// Serverless HTTP endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub lessons_url: String,
    pub token_url: String,
    pub progress_url: String,
    pub store_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            lessons_url: "http://localhost:3000/api/lessons".into(),
            token_url: "http://localhost:3000/api/video-token".into(),
            progress_url: "http://localhost:3000/api/progress".into(),
            store_url: "http://localhost:3000/api".into(),
            request_timeout_secs: 15,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CdnSettings {
    /// Base URL of the video delivery host, without trailing slash.
    pub stream_base: String,
}

impl Default for CdnSettings {
    fn default() -> Self {
        Self {
            stream_base: "https://videodelivery.net".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub countdown_secs: u32,
    pub progress_interval_secs: u64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 8,
            progress_interval_secs: 3,
        }
    }
}

impl PlayerSettings {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub url: String,
    /// Size of one base64 slice. Must stay below the socket message ceiling.
    pub chunk_size: usize,
    pub send_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001".into(),
            chunk_size: 30 * 1024,
            send_delay_ms: 100,
            connect_timeout_secs: 5,
            response_timeout_secs: 120,
        }
    }
}

impl UploadSettings {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Settings {
    /// Load settings: defaults, then `path` if it exists, then environment
    /// variables such as `KITCLASS_UPLOAD__CHUNK_SIZE`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            } else {
                tracing::warn!("Config file {:?} not found, using defaults", path);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("KITCLASS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.chunk_size == 0 {
            return Err(ConfigError::Message("upload.chunk_size must be positive".into()));
        }
        if self.player.countdown_secs == 0 {
            return Err(ConfigError::Message("player.countdown_secs must be positive".into()));
        }
        if self.upload.connect_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "upload.connect_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
