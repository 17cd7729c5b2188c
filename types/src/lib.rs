//! Core domain types for the prompt reducer.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod message;
mod model;

pub use message::{ApiUsage, ChatMessage, Completion, Role};
pub use model::{DEFAULT_MODEL, ModelName, ModelParseError};

use thiserror::Error;

// ============================================================================
// API Key Types
// ============================================================================

/// Environment variable consulted for the OpenAI key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
#[error("API key must not be empty")]
pub struct EmptyApiKeyError;

/// OpenAI API key.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyApiKeyError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyApiKeyError);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}
