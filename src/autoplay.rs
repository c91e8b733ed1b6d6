//! Lesson auto-advance: the countdown state machine and its timer.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// State of the auto-advance controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayState {
    /// Current lesson is playing.
    Playing,
    /// Seconds left before the next lesson starts.
    CountingDown(u32),
    /// Countdown reached zero; the next lesson is about to become current.
    Advancing,
    /// Last lesson finished. Stays until the viewer dismisses it.
    EndOfSeries,
}

/// Events fed back into the player from background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// One second elapsed on the countdown started as `generation`.
    CountdownTick { generation: u64 },
}

/// Tracks the current lesson and drives transitions between lessons.
///
/// `current` is always within `[0, len)`.
#[derive(Debug, Clone)]
pub struct Autoplay {
    current: usize,
    len: usize,
    countdown_from: u32,
    state: AutoplayState,
}

impl Autoplay {
    /// `None` for an empty lesson list.
    pub fn new(len: usize, countdown_from: u32) -> Option<Self> {
        (len > 0).then(|| Self {
            current: 0,
            len,
            countdown_from: countdown_from.max(1),
            state: AutoplayState::Playing,
        })
    }

    /// Index of the current lesson.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Get the controller state.
    pub fn state(&self) -> AutoplayState {
        self.state
    }

    /// Check if a lesson follows the current one.
    pub fn has_next(&self) -> bool {
        self.current + 1 < self.len
    }

    /// Check if a countdown is running.
    pub fn is_counting_down(&self) -> bool {
        matches!(self.state, AutoplayState::CountingDown(_))
    }

    /// Playback of the current lesson ended.
    pub fn ended(&mut self) -> AutoplayState {
        if self.state == AutoplayState::Playing {
            self.state = if self.has_next() {
                AutoplayState::CountingDown(self.countdown_from)
            } else {
                AutoplayState::EndOfSeries
            };
        }
        self.state
    }

    /// One second of countdown elapsed.
    pub fn tick(&mut self) -> AutoplayState {
        if let AutoplayState::CountingDown(n) = self.state {
            self.state = match n.saturating_sub(1) {
                0 => AutoplayState::Advancing,
                left => AutoplayState::CountingDown(left),
            };
        }
        self.state
    }

    /// Commit a pending advance. Returns the new current index.
    pub fn advance(&mut self) -> Option<usize> {
        if self.state != AutoplayState::Advancing {
            return None;
        }
        self.current = (self.current + 1).min(self.len - 1);
        self.state = AutoplayState::Playing;
        Some(self.current)
    }

    /// Move to the next lesson. On the last lesson nothing changes, so an
    /// end-of-series prompt stays open until dismissed.
    pub fn next(&mut self) -> usize {
        if !self.has_next() {
            return self.current;
        }
        self.select(self.current + 1)
    }

    /// Move to the previous lesson, cancelling any countdown. A single-lesson
    /// end-of-series prompt stays open until dismissed.
    pub fn previous(&mut self) -> usize {
        if self.current == 0 && self.state == AutoplayState::EndOfSeries {
            return self.current;
        }
        self.select(self.current.saturating_sub(1))
    }

    /// Jump to lesson `index`, cancelling any countdown. Out-of-range
    /// indices are clamped.
    pub fn select(&mut self, index: usize) -> usize {
        self.current = index.min(self.len - 1);
        self.state = AutoplayState::Playing;
        self.current
    }

    /// Close the end-of-series prompt.
    pub fn dismiss(&mut self) -> AutoplayState {
        if self.state == AutoplayState::EndOfSeries {
            self.state = AutoplayState::Playing;
        }
        self.state
    }
}

/// Background task sending one tick per second.
///
/// Dropping it aborts the task, so only one countdown can be live per owner.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a countdown sending `ticks` ticks tagged with `generation`.
    pub fn start(generation: u64, ticks: u32, event_tx: mpsc::Sender<PlayerEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // First tick completes immediately.
            interval.tick().await;

            for _ in 0..ticks {
                interval.tick().await;
                if event_tx
                    .send(PlayerEvent::CountdownTick { generation })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        Self { generation, handle }
    }

    /// Get the generation this countdown tags its ticks with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the countdown. No further ticks are sent.
    pub fn cancel(self) {
        tracing::debug!("Cancelling countdown {}", self.generation);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
