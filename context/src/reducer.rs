//! The chunk-and-rate-limit loop.
//!
//! [`ContextReducer`] cuts a long context into token-bounded slices, sends each
//! slice together with the prompt as one request, and collects the responses in
//! slice order while keeping usage under the per-minute quota.

use std::time::Duration;

use thiserror::Error;

use reducer_providers::{CompletionService, ProviderError};
use reducer_types::{ChatMessage, ModelName};

use crate::model_limits::{BudgetError, LimitProfile};
use crate::rate_window::{RateWindow, ThrottleStage};
use crate::token_counter::{TokenCounter, TokenizerError};

/// Joins the prompt and the context slice in every request.
pub const SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct ReducerSettings {
    pub model: ModelName,
    pub limits: LimitProfile,
}

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error("completion request {iteration} failed")]
    Completion {
        iteration: usize,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleWait {
    pub iteration: usize,
    pub stage: ThrottleStage,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReductionStats {
    pub iterations: usize,
    pub slice_budget: usize,
    pub context_tokens: usize,
    pub prompt_tokens: usize,
    /// Tokens sent, summed over all requests (prompt + separator + slice).
    pub input_tokens: usize,
    /// Tokens received, counted locally.
    pub output_tokens: usize,
    pub waits: Vec<ThrottleWait>,
}

impl ReductionStats {
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        self.waits.iter().map(|w| w.duration).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Reduction {
    /// One entry per request, in slice order.
    pub responses: Vec<String>,
    pub stats: ReductionStats,
}

#[derive(Debug)]
pub struct ContextReducer<S> {
    settings: ReducerSettings,
    counter: TokenCounter,
    service: S,
}

impl<S: CompletionService> ContextReducer<S> {
    pub fn new(settings: ReducerSettings, counter: TokenCounter, service: S) -> Self {
        Self {
            settings,
            counter,
            service,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ReducerSettings {
        &self.settings
    }

    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Context tokens that fit in one request next to `prompt`.
    pub fn slice_budget(&self, prompt: &str) -> Result<usize, BudgetError> {
        self.settings.limits.slice_budget(
            self.counter.count_str(prompt),
            self.counter.count_str(SEPARATOR),
        )
    }

    /// Sends `context` through the model slice by slice with `prompt` prepended.
    ///
    /// Requests are strictly sequential. Any tokenizer or service failure ends
    /// the run; responses gathered so far are discarded.
    pub async fn reduce(&self, context: &str, prompt: &str) -> Result<Reduction, ReduceError> {
        let context_tokens = self.counter.count_str(context);
        let prompt_tokens = self.counter.count_str(prompt);
        let separator_tokens = self.counter.count_str(SEPARATOR);
        let budget = self
            .settings
            .limits
            .slice_budget(prompt_tokens, separator_tokens)?;

        tracing::info!(
            model = %self.settings.model,
            context_tokens,
            prompt_tokens,
            slice_budget = budget,
            "Reducing context"
        );

        let mut stats = ReductionStats {
            slice_budget: budget,
            context_tokens,
            prompt_tokens,
            ..ReductionStats::default()
        };
        let mut responses = Vec::new();
        let mut window = RateWindow::new(self.settings.limits.tokens_per_minute);
        let mut remaining = context.to_string();

        while !remaining.is_empty() {
            let iteration = stats.iterations + 1;

            if let Some(duration) = window.roll_or_wait().await {
                stats.waits.push(ThrottleWait {
                    iteration,
                    stage: ThrottleStage::BeforeSlice,
                    duration,
                });
            }

            let (slice, rest) = self.counter.truncate_from_start(&remaining, budget)?;
            if slice.is_empty() {
                tracing::warn!(
                    remaining_bytes = remaining.len(),
                    "Empty slice, stopping early"
                );
                break;
            }
            remaining = rest;

            let request = format!("{prompt}{SEPARATOR}{slice}");
            let input_tokens = self.counter.count_str(&request);

            if let Some(duration) = window.reserve(input_tokens).await {
                stats.waits.push(ThrottleWait {
                    iteration,
                    stage: ThrottleStage::BeforeRequest,
                    duration,
                });
            }

            let messages = [ChatMessage::user(request)];
            let completion = self
                .service
                .complete(&self.settings.model, &messages)
                .await
                .map_err(|source| ReduceError::Completion { iteration, source })?;

            let output_tokens = self.counter.count_str(&completion.text);
            window.record(input_tokens + output_tokens);

            stats.iterations = iteration;
            stats.input_tokens += input_tokens;
            stats.output_tokens += output_tokens;

            tracing::info!(
                iteration,
                input_tokens,
                output_tokens,
                window_tokens = window.tokens_used(),
                "Slice processed"
            );

            responses.push(completion.text);
        }

        Ok(Reduction { responses, stats })
    }
}
