//! Model limit profiles and registry.
//!
//! This module provides [`LimitProfile`] for the static size and rate limits of a
//! model, and [`ModelRegistry`] for looking profiles up by model name with prefix
//! matching. Unknown models are an error: without a profile there is no way to
//! size a slice.

use std::collections::HashMap;

use thiserror::Error;

/// Headroom divisor applied to the per-slice budget. Leaves room for rate-limit
/// estimation error and output-length variance.
pub const SLICE_SAFETY_DIVISOR: i64 = 4;

/// Each model has a context window, an output reservation and a per-minute token quota.
///
/// # Example
///
/// ```
/// use reducer_context::LimitProfile;
///
/// let limits = LimitProfile::new(128_000, 16_384, 200_000);
/// // (min(200_000, 128_000) - 50 - 1 - 16_384) / 4
/// assert_eq!(limits.slice_budget(50, 1).unwrap(), 27_891);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitProfile {
    /// Maximum context window in tokens.
    pub context_length: usize,
    /// Tokens reserved for the model's output.
    pub output_reserve: usize,
    /// Input plus output tokens allowed per rolling minute.
    pub tokens_per_minute: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "per-slice token budget is {budget}: min(tokens_per_minute {tokens_per_minute}, \
     context_length {context_length}) - prompt {prompt_tokens} - separator {separator_tokens} \
     - output reserve {output_reserve}, divided by {SLICE_SAFETY_DIVISOR}, must be positive; \
     shorten the prompt"
)]
pub struct BudgetError {
    pub budget: i64,
    pub tokens_per_minute: usize,
    pub context_length: usize,
    pub prompt_tokens: usize,
    pub separator_tokens: usize,
    pub output_reserve: usize,
}

impl LimitProfile {
    #[must_use]
    pub const fn new(context_length: usize, output_reserve: usize, tokens_per_minute: usize) -> Self {
        Self {
            context_length,
            output_reserve,
            tokens_per_minute,
        }
    }

    /// Tokens of context sent with each request.
    ///
    /// `(min(tokens_per_minute, context_length) - prompt - separator - output_reserve) / 4`,
    /// computed in signed arithmetic. Zero or negative budgets are rejected.
    pub fn slice_budget(
        &self,
        prompt_tokens: usize,
        separator_tokens: usize,
    ) -> Result<usize, BudgetError> {
        let ceiling = self.tokens_per_minute.min(self.context_length) as i64;
        let available =
            ceiling - prompt_tokens as i64 - separator_tokens as i64 - self.output_reserve as i64;
        let budget = available / SLICE_SAFETY_DIVISOR;

        if budget <= 0 {
            return Err(BudgetError {
                budget,
                tokens_per_minute: self.tokens_per_minute,
                context_length: self.context_length,
                prompt_tokens,
                separator_tokens,
                output_reserve: self.output_reserve,
            });
        }
        Ok(budget as usize)
    }
}

/// Where a profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitProfileSource {
    /// Exact match from a configured override.
    Override,
    /// Matched a built-in prefix (the matched prefix).
    Builtin(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimitProfile {
    limits: LimitProfile,
    source: LimitProfileSource,
}

impl ResolvedLimitProfile {
    #[must_use]
    pub const fn limits(self) -> LimitProfile {
        self.limits
    }

    #[must_use]
    pub const fn source(self) -> LimitProfileSource {
        self.source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no limit profile for model '{model}'; known models: {known}")]
pub struct UnknownModelError {
    pub model: String,
    pub known: String,
}

/// Built-in profiles, most specific prefix first.
const KNOWN_MODELS: &[(&str, LimitProfile)] = &[(
    "gpt-4o-mini",
    LimitProfile::new(128_000, 16_384, 200_000),
)];

/// Registry of model limit profiles.
///
/// Lookup order:
/// 1. Exact match in overrides (from the configuration file)
/// 2. Prefix match against built-in profiles
///    (`"gpt-4o-mini-2024-07-18"` matches `"gpt-4o-mini"`)
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    overrides: HashMap<String, LimitProfile>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match profile that takes precedence over built-in ones.
    #[must_use]
    pub fn with_override(mut self, model: impl Into<String>, limits: LimitProfile) -> Self {
        self.overrides.insert(model.into(), limits);
        self
    }

    pub fn get(&self, model: &str) -> Result<ResolvedLimitProfile, UnknownModelError> {
        if let Some(limits) = self.overrides.get(model) {
            return Ok(ResolvedLimitProfile {
                limits: *limits,
                source: LimitProfileSource::Override,
            });
        }

        for (prefix, limits) in KNOWN_MODELS {
            if model.starts_with(prefix) {
                return Ok(ResolvedLimitProfile {
                    limits: *limits,
                    source: LimitProfileSource::Builtin(prefix),
                });
            }
        }

        let mut known: Vec<&str> = KNOWN_MODELS.iter().map(|(name, _)| *name).collect();
        known.extend(self.overrides.keys().map(String::as_str));
        known.sort_unstable();
        Err(UnknownModelError {
            model: model.to_string(),
            known: known.join(", "),
        })
    }
}
