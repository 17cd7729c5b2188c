//! Context reduction under model size and rate limits.
//!
//! This module provides:
//! - Model-specific limit profiles and the per-slice token budget
//! - Exact token counting and token-bounded splitting via tiktoken
//! - A per-minute token window that suspends the caller when the quota is spent
//! - The slice-by-slice reduction loop
//!
//! # Architecture
//!
//! ```text
//! ContextReducer
//! ├── settings: ReducerSettings (model + LimitProfile)
//! ├── counter: TokenCounter (tiktoken)
//! └── service: impl CompletionService
//!
//! reduce() (one call)
//! └── window: RateWindow (tokens spent in the current minute)
//! ```

mod model_limits;
mod rate_window;
mod reducer;
mod token_counter;

pub use model_limits::{
    BudgetError, LimitProfile, LimitProfileSource, ModelRegistry, ResolvedLimitProfile,
    SLICE_SAFETY_DIVISOR, UnknownModelError,
};
pub use rate_window::{RateWindow, ThrottleStage, WINDOW};
pub use reducer::{
    ContextReducer, ReduceError, Reduction, ReductionStats, ReducerSettings, SEPARATOR,
    ThrottleWait,
};
pub use token_counter::{Encoding, TokenCounter, TokenizerError};
