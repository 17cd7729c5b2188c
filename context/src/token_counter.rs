//! Token counting and token-bounded splitting using tiktoken.
//!
//! The encoding is chosen from the model name (`o200k_base` for the gpt-4o family,
//! `cl100k_base` for gpt-4 / gpt-3.5). Counts use ordinary encoding, so special
//! token markers inside the text are counted as plain text.

use std::sync::OnceLock;

use thiserror::Error;
use tiktoken_rs::tokenizer::{Tokenizer, get_tokenizer};
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base};

/// The tiktoken encoders are expensive to initialize (they load vocabulary data),
/// so each one is created once and shared by every `TokenCounter`.
static O200K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();
static CL100K_BASE: OnceLock<Option<CoreBPE>> = OnceLock::new();

/// How far the split point may move to land on a UTF-8 character boundary.
/// A single character never spans more than four byte-level tokens.
const MAX_BOUNDARY_SHIFT: usize = 4;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("no tokenizer is known for model '{0}'")]
    UnknownModel(String),
    #[error("failed to load the {0} vocabulary")]
    Unavailable(&'static str),
    #[error("failed to decode tokens: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    O200kBase,
    Cl100kBase,
}

impl Encoding {
    #[must_use]
    pub fn for_model(model: &str) -> Option<Self> {
        match get_tokenizer(model)? {
            Tokenizer::O200kBase => Some(Self::O200kBase),
            Tokenizer::Cl100kBase => Some(Self::Cl100kBase),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::O200kBase => "o200k_base",
            Self::Cl100kBase => "cl100k_base",
        }
    }

    fn encoder(self) -> Option<&'static CoreBPE> {
        match self {
            Self::O200kBase => O200K_BASE.get_or_init(|| o200k_base().ok()).as_ref(),
            Self::Cl100kBase => CL100K_BASE.get_or_init(|| cl100k_base().ok()).as_ref(),
        }
    }
}

/// Model-specific token counter.
///
/// Deterministic: identical input always yields identical counts and splits.
///
/// # Example
///
/// ```
/// use reducer_context::TokenCounter;
///
/// let counter = TokenCounter::for_model("gpt-4o-mini").unwrap();
/// let (head, tail) = counter.truncate_from_start("Hello, world!", 100).unwrap();
/// assert_eq!(head, "Hello, world!");
/// assert!(tail.is_empty());
/// ```
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoding: Encoding,
    encoder: &'static CoreBPE,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding.name())
            .finish_non_exhaustive()
    }
}

impl TokenCounter {
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let encoding = Encoding::for_model(model)
            .ok_or_else(|| TokenizerError::UnknownModel(model.to_string()))?;
        Self::with_encoding(encoding)
    }

    pub fn with_encoding(encoding: Encoding) -> Result<Self, TokenizerError> {
        let Some(encoder) = encoding.encoder() else {
            tracing::error!(encoding = encoding.name(), "Failed to initialize tiktoken encoder");
            return Err(TokenizerError::Unavailable(encoding.name()));
        };
        Ok(Self { encoding, encoder })
    }

    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub fn count_str(&self, text: &str) -> usize {
        self.encoder.encode_ordinary(text).len()
    }

    /// Splits off the first `max_tokens` tokens of `text`.
    ///
    /// Returns `(text, "")` when the whole text fits. Otherwise the head is the
    /// decoded token prefix and the tail the decoded remainder, so `head + tail`
    /// reproduces `text`. When the `max_tokens` boundary falls inside a multi-byte
    /// character the split moves to the nearest earlier character boundary, or
    /// the nearest later one if the prefix holds no complete character.
    pub fn truncate_from_start(
        &self,
        text: &str,
        max_tokens: usize,
    ) -> Result<(String, String), TokenizerError> {
        let tokens = self.encoder.encode_ordinary(text);
        if max_tokens >= tokens.len() {
            return Ok((text.to_string(), String::new()));
        }
        if max_tokens == 0 {
            return Ok((String::new(), text.to_string()));
        }

        let decode = |part: &[u32]| {
            self.encoder
                .decode(part.to_vec())
                .map_err(|e| TokenizerError::Decode(e.to_string()))
        };

        let earlier = (1..=max_tokens).rev().take(MAX_BOUNDARY_SHIFT);
        let later = (max_tokens + 1..tokens.len()).take(MAX_BOUNDARY_SHIFT);
        let mut last_err = None;
        for split in earlier.chain(later) {
            match decode(&tokens[..split]) {
                Ok(head) => {
                    if split != max_tokens {
                        tracing::debug!(
                            requested = max_tokens,
                            actual = split,
                            "Moved token split to a character boundary"
                        );
                    }
                    let tail = decode(&tokens[split..])?;
                    return Ok((head, tail));
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            TokenizerError::Decode("no character boundary near split point".to_string())
        }))
    }
}
