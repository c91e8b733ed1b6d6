//! Course session: the lesson player's state for one course page.
//!
//! Wires the lesson list, playback tokens, stored progress, the progress
//! reporter and auto-advance together. Background ticks arrive on the
//! receiver returned by [`CourseSession::load`] and are fed back through
//! [`CourseSession::handle`].

use crate::assets::{MediaResolver, PlaybackSource};
use crate::autoplay::{Autoplay, AutoplayState, Countdown, PlayerEvent};
use crate::config::Settings;
use crate::context::ViewerContext;
use crate::error::{ClientError, SessionError};
use crate::lessons::{Lesson, LessonFetcher};
use crate::playback::{PlaybackAuthorizer, PlaybackTokens};
use crate::progress::{ProgressReporter, ReportOutcome};
use crate::store::Storefront;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Load-cycle state as shown by a view.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    /// Request in flight.
    Loading,
    /// Data arrived.
    Ready(T),
    /// Load failed; `message` is shown inline.
    Failed { message: String },
}

impl<T> LoadState<T> {
    /// Map a load result, rendering the error with `message`.
    pub fn from_result<E>(result: Result<T, E>, message: impl FnOnce(&E) -> String) -> Self {
        match result {
            Ok(value) => LoadState::Ready(value),
            Err(e) => LoadState::Failed { message: message(&e) },
        }
    }

    /// Check if the data is available.
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }
}

/// Endpoint clients shared by every session.
#[derive(Debug, Clone)]
pub struct Services {
    client: Client,
    pub lessons: LessonFetcher,
    pub authorizer: PlaybackAuthorizer,
    pub resolver: MediaResolver,
    pub store: Storefront,
    progress_url: String,
    progress_interval: Duration,
    countdown_secs: u32,
}

impl Services {
    /// Build every client from `settings`, sharing one HTTP connection pool.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(settings.api.request_timeout())
            .build()?;

        Ok(Self {
            lessons: LessonFetcher::new(client.clone(), &settings.api.lessons_url),
            authorizer: PlaybackAuthorizer::new(client.clone(), &settings.api.token_url),
            resolver: MediaResolver::new(&settings.cdn.stream_base),
            store: Storefront::new(client.clone(), &settings.api.store_url),
            progress_url: settings.api.progress_url.clone(),
            progress_interval: settings.player.progress_interval(),
            countdown_secs: settings.player.countdown_secs,
            client,
        })
    }

    /// Create a progress reporter with a fresh throttle window.
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.client.clone(), &self.progress_url, self.progress_interval)
    }
}

/// Player state for one course page.
#[derive(Debug)]
pub struct CourseSession {
    ctx: ViewerContext,
    lessons: Vec<Lesson>,
    tokens: PlaybackTokens,
    progress: HashMap<usize, f64>,
    resolver: MediaResolver,
    reporter: ProgressReporter,
    autoplay: Autoplay,
    countdown: Option<Countdown>,
    generation: u64,
    event_tx: mpsc::Sender<PlayerEvent>,
}

impl CourseSession {
    /// Fetch lessons, authorize private videos and read stored progress.
    pub async fn load(
        services: &Services,
        ctx: ViewerContext,
        course_id: &str,
    ) -> Result<(Self, mpsc::Receiver<PlayerEvent>), SessionError> {
        let lessons = services.lessons.fetch(course_id).await?;
        let tokens = services.authorizer.authorize(&ctx, &lessons).await;
        let reporter = services.progress_reporter();

        let progress = if ctx.is_signed_in() {
            match reporter.fetch(&ctx).await {
                Ok(records) => records
                    .into_iter()
                    .map(|r| (r.video_index, r.progress))
                    .collect(),
                Err(e) => {
                    tracing::warn!("Failed to load progress for {}: {}", course_id, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self::from_parts(
            ctx,
            lessons,
            tokens,
            progress,
            services.resolver.clone(),
            reporter,
            services.countdown_secs,
        )
        .ok_or_else(|| SessionError::NoLessons(course_id.to_string()))
    }

    /// Build a session from already-fetched data. `None` when `lessons` is
    /// empty.
    pub fn from_parts(
        ctx: ViewerContext,
        lessons: Vec<Lesson>,
        tokens: PlaybackTokens,
        progress: HashMap<usize, f64>,
        resolver: MediaResolver,
        reporter: ProgressReporter,
        countdown_secs: u32,
    ) -> Option<(Self, mpsc::Receiver<PlayerEvent>)> {
        let autoplay = Autoplay::new(lessons.len(), countdown_secs)?;
        let (event_tx, event_rx) = mpsc::channel(32);

        let session = Self {
            ctx,
            lessons,
            tokens,
            progress,
            resolver,
            reporter,
            autoplay,
            countdown: None,
            generation: 0,
            event_tx,
        };
        Some((session, event_rx))
    }

    /// Get the viewer context.
    pub fn context(&self) -> &ViewerContext {
        &self.ctx
    }

    /// Lessons in course order.
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    /// Index of the lesson being played.
    pub fn current_index(&self) -> usize {
        self.autoplay.current()
    }

    /// Get the lesson being played.
    pub fn current_lesson(&self) -> &Lesson {
        &self.lessons[self.autoplay.current()]
    }

    /// Get the auto-advance state.
    pub fn state(&self) -> AutoplayState {
        self.autoplay.state()
    }

    /// What to render for lesson `index`.
    pub fn source(&self, index: usize) -> Option<PlaybackSource> {
        let lesson = self.lessons.get(index)?;
        Some(self.resolver.source(lesson, &self.tokens))
    }

    /// What to render for the current lesson.
    pub fn current_source(&self) -> PlaybackSource {
        self.resolver.source(self.current_lesson(), &self.tokens)
    }

    /// Stored progress fraction for lesson `index`, 0 when unknown.
    pub fn progress_for(&self, index: usize) -> f64 {
        self.progress.get(&index).copied().unwrap_or(0.0)
    }

    /// Playback position changed.
    pub async fn time_update(&mut self, current_time: f64, duration: f64) -> ReportOutcome {
        let index = self.autoplay.current();
        let outcome = self
            .reporter
            .on_time_update(&self.ctx, index, current_time, duration)
            .await;
        if let ReportOutcome::Sent(fraction) = outcome {
            self.progress.insert(index, fraction);
        }
        outcome
    }

    /// Playback of the current lesson ended.
    pub fn ended(&mut self) -> AutoplayState {
        self.cancel_countdown();
        let state = self.autoplay.ended();

        match state {
            AutoplayState::CountingDown(n) => {
                self.generation += 1;
                tracing::debug!("Next lesson in {}s", n);
                self.countdown = Some(Countdown::start(self.generation, n, self.event_tx.clone()));
            }
            AutoplayState::EndOfSeries => {
                tracing::info!(
                    "Finished the last of {} lessons in {}",
                    self.lessons.len(),
                    self.ctx.course_name().unwrap_or("course")
                );
            }
            _ => {}
        }
        state
    }

    /// Apply an event from the session's receiver.
    pub fn handle(&mut self, event: PlayerEvent) -> AutoplayState {
        match event {
            PlayerEvent::CountdownTick { generation } => {
                if generation != self.generation || self.countdown.is_none() {
                    tracing::trace!("Ignoring stale countdown tick {}", generation);
                    return self.autoplay.state();
                }

                if self.autoplay.tick() == AutoplayState::Advancing {
                    self.cancel_countdown();
                    if let Some(index) = self.autoplay.advance() {
                        tracing::info!("Auto-advanced to lesson {}", index);
                    }
                }
                self.autoplay.state()
            }
        }
    }

    /// Go to the next lesson. No-op on the last lesson.
    pub fn next(&mut self) -> usize {
        self.cancel_countdown();
        self.autoplay.next()
    }

    /// Go to the previous lesson.
    pub fn previous(&mut self) -> usize {
        self.cancel_countdown();
        self.autoplay.previous()
    }

    /// Jump to lesson `index` from the lesson list.
    pub fn select(&mut self, index: usize) -> usize {
        self.cancel_countdown();
        self.autoplay.select(index)
    }

    /// Close the end-of-series prompt.
    pub fn dismiss(&mut self) -> AutoplayState {
        self.autoplay.dismiss()
    }

    fn cancel_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }
}
