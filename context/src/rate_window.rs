//! Per-minute token quota tracking.
//!
//! A [`RateWindow`] counts the tokens spent since the window started. The
//! window rolls over after [`WINDOW`]; before that, a request that would reach
//! the quota suspends the caller until the minute is over.

use std::time::Duration;

use tokio::time::Instant;

/// Length of one quota window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Which throttle check produced a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleStage {
    /// Start of an iteration, before the next slice is cut.
    BeforeSlice,
    /// After the request is assembled, before it is sent.
    BeforeRequest,
}

impl ThrottleStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeSlice => "before_slice",
            Self::BeforeRequest => "before_request",
        }
    }
}

#[derive(Debug)]
pub struct RateWindow {
    tokens_per_minute: u64,
    window_start: Instant,
    tokens_used: u64,
}

impl RateWindow {
    #[must_use]
    pub fn new(tokens_per_minute: usize) -> Self {
        Self {
            tokens_per_minute: tokens_per_minute as u64,
            window_start: Instant::now(),
            tokens_used: 0,
        }
    }

    #[must_use]
    pub const fn tokens_used(&self) -> u64 {
        self.tokens_used
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.window_start.elapsed()
    }

    fn reset(&mut self) {
        self.window_start = Instant::now();
        self.tokens_used = 0;
    }

    /// Rolls the window over once a minute has passed. If the quota is
    /// already spent inside the current minute, sleeps out the rest of it
    /// first. Returns the time slept.
    pub async fn roll_or_wait(&mut self) -> Option<Duration> {
        let elapsed = self.elapsed();
        if elapsed >= WINDOW {
            self.reset();
            return None;
        }
        if self.tokens_used < self.tokens_per_minute {
            return None;
        }

        let wait = WINDOW - elapsed;
        self.sleep(wait, ThrottleStage::BeforeSlice).await;
        self.reset();
        Some(wait)
    }

    /// Makes room for a request of `input_tokens`. Sleeps until the window
    /// ends when the request would reach the quota. Returns the time slept.
    pub async fn reserve(&mut self, input_tokens: usize) -> Option<Duration> {
        let projected = self.tokens_used.saturating_add(input_tokens as u64);
        if projected < self.tokens_per_minute {
            return None;
        }

        let wait = WINDOW.saturating_sub(self.elapsed());
        self.sleep(wait, ThrottleStage::BeforeRequest).await;
        self.reset();
        Some(wait)
    }

    pub fn record(&mut self, tokens: usize) {
        self.tokens_used = self.tokens_used.saturating_add(tokens as u64);
    }

    async fn sleep(&self, wait: Duration, stage: ThrottleStage) {
        tracing::info!(
            wait_secs = wait.as_secs_f64(),
            stage = stage.as_str(),
            tokens_used = self.tokens_used,
            tokens_per_minute = self.tokens_per_minute,
            "Token quota reached, waiting for the next window"
        );
        tokio::time::sleep(wait).await;
    }
}
