//! Playback progress reporting.

use crate::context::ViewerContext;
use crate::error::ClientError;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Stored progress of one lesson for the current viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub video_index: usize,
    #[serde(deserialize_with = "clamped_fraction")]
    pub progress: f64,
}

impl ProgressRecord {
    /// Create a record with `progress` clamped to [0, 1].
    pub fn new(video_index: usize, progress: f64) -> Self {
        Self {
            video_index,
            progress: clamp_fraction(progress),
        }
    }
}

fn clamped_fraction<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_fraction)
}

/// Clamp to [0, 1]; NaN counts as no progress.
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Serialize)]
struct ProgressUpdate<'a> {
    user_email: &'a str,
    course_name: &'a str,
    video_index: usize,
    progress: f64,
}

/// Why a time update was not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Viewer is signed out.
    MissingEmail,
    /// Course name is blank.
    MissingCourse,
    /// Duration is zero or unknown.
    MissingDuration,
}

/// Result of a time-update signal. Reporting never fails the player.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Written with this clamped fraction.
    Sent(f64),
    /// Inside the throttle window.
    Throttled,
    /// Not reportable.
    Skipped(SkipReason),
    /// Write failed; logged and dropped.
    Failed(String),
}

/// Writes playback position at most once per interval.
#[derive(Debug)]
pub struct ProgressReporter {
    client: Client,
    url: String,
    interval: Duration,
    last_report: Option<Instant>,
}

impl ProgressReporter {
    /// Create a new reporter writing at most once per `interval`.
    pub fn new(client: Client, url: impl Into<String>, interval: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            interval,
            last_report: None,
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_report
            .map(|last| now.duration_since(last) >= self.interval)
            .unwrap_or(true)
    }

    /// Handle a playback time update for lesson `video_index`.
    pub async fn on_time_update(
        &mut self,
        ctx: &ViewerContext,
        video_index: usize,
        current_time: f64,
        duration: f64,
    ) -> ReportOutcome {
        let now = Instant::now();
        if !self.due(now) {
            return ReportOutcome::Throttled;
        }

        let Some(email) = ctx.email() else {
            tracing::debug!("Skipping progress report: no viewer email");
            return ReportOutcome::Skipped(SkipReason::MissingEmail);
        };
        let Some(course_name) = ctx.course_name() else {
            tracing::debug!("Skipping progress report: no course name");
            return ReportOutcome::Skipped(SkipReason::MissingCourse);
        };
        if !duration.is_finite() || duration <= 0.0 {
            tracing::debug!("Skipping progress report: duration unknown");
            return ReportOutcome::Skipped(SkipReason::MissingDuration);
        }

        self.last_report = Some(now);
        let progress = clamp_fraction(current_time / duration);

        let update = ProgressUpdate {
            user_email: email,
            course_name,
            video_index,
            progress,
        };

        match self.send(&update).await {
            Ok(()) => {
                tracing::trace!("Reported progress {:.3} for lesson {}", progress, video_index);
                ReportOutcome::Sent(progress)
            }
            Err(e) => {
                tracing::warn!("Failed to report progress: {}", e);
                ReportOutcome::Failed(e.to_string())
            }
        }
    }

    async fn send(&self, update: &ProgressUpdate<'_>) -> Result<(), ClientError> {
        let res = self.client.put(&self.url).json(update).send().await?;
        if !res.status().is_success() {
            return Err(ClientError::Status {
                status: res.status().as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }

    /// Read stored progress for the viewer's course.
    pub async fn fetch(&self, ctx: &ViewerContext) -> Result<Vec<ProgressRecord>, ClientError> {
        let email = ctx
            .email()
            .ok_or(ClientError::MissingIdentity("reading progress"))?;
        let course_name = ctx
            .course_name()
            .ok_or_else(|| ClientError::InvalidRequest("Course name is required".into()))?;

        let res = self
            .client
            .get(&self.url)
            .query(&[("user_email", email), ("course_name", course_name)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(ClientError::Status {
                status: res.status().as_u16(),
                url: self.url.clone(),
            });
        }

        Ok(res.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(30.0, 60.0, 0.5)]
    #[case(65.0, 60.0, 1.0)]
    #[case(-2.0, 60.0, 0.0)]
    #[case(0.0, 60.0, 0.0)]
    fn fraction_is_clamped(#[case] time: f64, #[case] duration: f64, #[case] expected: f64) {
        assert_eq!(clamp_fraction(time / duration), expected);
    }

    #[test]
    fn nan_is_zero() {
        assert_eq!(clamp_fraction(f64::NAN), 0.0);
    }

    #[test]
    fn stored_progress_is_clamped_on_read() {
        let record: ProgressRecord =
            serde_json::from_str(r#"{"video_index":2,"progress":1.7}"#).unwrap();
        assert_eq!(record, ProgressRecord::new(2, 1.0));
    }

    #[tokio::test]
    async fn missing_identity_skips_without_network() {
        let mut reporter = ProgressReporter::new(
            Client::new(),
            "http://127.0.0.1:9/progress",
            Duration::from_secs(3),
        );
        let ctx = ViewerContext::anonymous("Pi-Guard");
        assert_eq!(
            reporter.on_time_update(&ctx, 0, 10.0, 60.0).await,
            ReportOutcome::Skipped(SkipReason::MissingEmail)
        );

        let ctx = ViewerContext::new(Some("a@b.c".into()), "Pi-Guard");
        assert_eq!(
            reporter.on_time_update(&ctx, 0, 10.0, f64::NAN).await,
            ReportOutcome::Skipped(SkipReason::MissingDuration)
        );
    }
}
