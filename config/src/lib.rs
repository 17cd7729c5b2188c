//! Configuration file loading.
//!
//! The file lives at `~/.reducer/config.toml` (or wherever `REDUCER_CONFIG`
//! points) and is optional. Every section is optional too.

use std::collections::HashMap;
use std::{env, path::Path, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

use reducer_context::{LimitProfile, ModelRegistry};
use reducer_types::{ApiKey, OPENAI_API_KEY_ENV};

/// Overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "REDUCER_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct ReducerConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub openai: Option<OpenAIConfig>,
    /// Limit profiles keyed by exact model name.
    pub limits: Option<HashMap<String, LimitsConfig>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
#[error(
    "no OpenAI API key: set [api_keys] openai in the config file or the {OPENAI_API_KEY_ENV} \
     environment variable (a .env file in the working directory is also read)"
)]
pub struct MissingApiKeyError;

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub model: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub openai: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let openai = if self.openai.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("openai", &openai).finish()
    }
}

/// `OpenAI` endpoint settings.
///
/// ```toml
/// [openai]
/// base_url = "https://api.openai.com"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct OpenAIConfig {
    pub base_url: Option<String>,
}

/// Limit profile for one model.
///
/// ```toml
/// [limits."gpt-4o-mini"]
/// context_length = 128000
/// output_reserve = 16384
/// tokens_per_minute = 200000
/// ```
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    pub context_length: usize,
    pub output_reserve: usize,
    pub tokens_per_minute: usize,
}

impl From<LimitsConfig> for LimitProfile {
    fn from(value: LimitsConfig) -> Self {
        LimitProfile::new(
            value.context_length,
            value.output_reserve,
            value.tokens_per_minute,
        )
    }
}

/// Replaces `${VAR}` with the value of `VAR` (empty when unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl ReducerConfig {
    /// Loads the configuration file, if there is one.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file");
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(Some(config))
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.app.as_ref()?.model.as_deref()
    }

    #[must_use]
    pub fn openai_base_url(&self) -> Option<&str> {
        self.openai.as_ref()?.base_url.as_deref()
    }

    /// The configured key with `${VAR}` references expanded. Blank values count as unset.
    #[must_use]
    pub fn openai_api_key(&self) -> Option<ApiKey> {
        let raw = self.api_keys.as_ref()?.openai.as_deref()?;
        ApiKey::new(expand_env_vars(raw)).ok()
    }

    /// Built-in limit profiles plus the `[limits]` table.
    #[must_use]
    pub fn model_registry(&self) -> ModelRegistry {
        self.limits
            .iter()
            .flatten()
            .fold(ModelRegistry::new(), |registry, (model, limits)| {
                registry.with_override(model.clone(), LimitProfile::from(*limits))
            })
    }
}

/// Key from the config file, then from `OPENAI_API_KEY`.
pub fn resolve_api_key(config: Option<&ReducerConfig>) -> Result<ApiKey, MissingApiKeyError> {
    if let Some(key) = config.and_then(ReducerConfig::openai_api_key) {
        return Ok(key);
    }
    env::var(OPENAI_API_KEY_ENV)
        .ok()
        .and_then(|raw| ApiKey::new(raw).ok())
        .ok_or(MissingApiKeyError)
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".reducer").join("config.toml"))
}
