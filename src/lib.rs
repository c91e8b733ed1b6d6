//! Course player and CV upload client for the kit academy site.
//!
//! The player side loads a course's lessons, authorizes private videos,
//! reports watch progress and auto-advances between lessons. The upload side
//! streams a CV to the analysis service in paced base64 chunks.

pub mod assets;
pub mod autoplay;
pub mod config;
pub mod context;
pub mod error;
pub mod lessons;
pub mod logging;
pub mod playback;
pub mod progress;
pub mod session;
pub mod store;
pub mod upload;

pub use assets::{MediaResolver, PlaybackSource};
pub use autoplay::{Autoplay, AutoplayState, PlayerEvent};
pub use config::Settings;
pub use context::ViewerContext;
pub use error::{ClientError, SessionError, UploadError};
pub use lessons::{Lesson, LessonFetcher};
pub use playback::{PlaybackAuthorizer, PlaybackTokens};
pub use progress::{ProgressRecord, ProgressReporter, ReportOutcome};
pub use session::{CourseSession, LoadState, Services};
pub use store::{Feedback, StockStatus, Storefront};
pub use upload::{UploadClient, UploadEvent, UploadState};
