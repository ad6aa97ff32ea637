//! Pacing primitives
//!
//! Every wait in a crawl (pre-request politeness, retry backoff, warm-up
//! pauses and inter-page delays) goes through a [`Sleeper`], so tests can
//! observe the schedule without waiting on a real clock.

use crate::config::{PauseWindow, RequestConfig};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Something that can suspend the crawl for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested pauses and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pauses requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

impl PauseWindow {
    /// Draws a uniformly random pause within the window
    pub fn sample(&self) -> Duration {
        let millis = if self.min_ms >= self.max_ms {
            self.min_ms
        } else {
            rand::random_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(millis)
    }

    pub fn contains(&self, duration: Duration) -> bool {
        let millis = duration.as_millis();
        millis >= u128::from(self.min_ms) && millis <= u128::from(self.max_ms)
    }
}

/// Fixed two-tier retry policy for a single page request
///
/// Attempt 1 waits within `first_attempt_pause`; every later attempt waits
/// within the longer `retry_pause`. The windows do not grow with the attempt
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub attempt_budget: u32,
    pub timeout: Duration,
    pub first_attempt_pause: PauseWindow,
    pub retry_pause: PauseWindow,
}

impl BackoffPolicy {
    /// Pause window before the given 1-based attempt
    pub fn pause_before(&self, attempt: u32) -> PauseWindow {
        if attempt <= 1 {
            self.first_attempt_pause
        } else {
            self.retry_pause
        }
    }

    /// A policy with the given budget and no pauses
    pub fn immediate(attempt_budget: u32) -> Self {
        Self {
            attempt_budget,
            timeout: Duration::from_secs(5),
            first_attempt_pause: PauseWindow::zero(),
            retry_pause: PauseWindow::zero(),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RequestConfig::default())
    }
}

impl From<&RequestConfig> for BackoffPolicy {
    fn from(config: &RequestConfig) -> Self {
        Self {
            attempt_budget: config.attempt_budget.max(1),
            timeout: config.timeout(),
            first_attempt_pause: config.first_attempt_pause,
            retry_pause: config.retry_pause,
        }
    }
}
