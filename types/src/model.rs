//! Model identifier type.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model used when neither the command line nor the config file names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelParseError {
    #[error("model name must not be empty")]
    Empty,
    #[error("model name '{0}' contains whitespace")]
    Whitespace(String),
}

/// A trimmed, non-empty model identifier as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(Cow<'static, str>);

impl ModelName {
    pub fn parse(raw: &str) -> Result<Self, ModelParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelParseError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ModelParseError::Whitespace(trimmed.to_string()));
        }
        Ok(Self(Cow::Owned(trimmed.to_ascii_lowercase())))
    }

    #[must_use]
    pub const fn known(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[must_use]
    pub const fn default_model() -> Self {
        Self::known(DEFAULT_MODEL)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl Default for ModelName {
    fn default() -> Self {
        Self::default_model()
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ModelName {
    type Error = ModelParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelName> for String {
    fn from(value: ModelName) -> Self {
        value.0.into_owned()
    }
}
