//! Completion service clients.
//!
//! # Architecture
//!
//! - [`CompletionService`] - the seam the reducer talks to: one list of messages in,
//!   one completion text out. Test doubles implement it directly.
//! - [`openai`] - OpenAI Chat Completions client (non-streaming).
//!
//! # Error Handling
//!
//! Every failure is returned as [`ProviderError`]. Nothing is retried here; the
//! caller decides whether a failed request ends the run.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use reducer_types;
use reducer_types::{ChatMessage, Completion, ModelName};

pub mod openai;

pub use openai::OpenAIChatClient;

/// Canonical OpenAI API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com";

const CONNECT_TIMEOUT_SECS: u64 = 30;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 4;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

pub type CompletionFut<'a> =
    Pin<Box<dyn Future<Output = Result<Completion, ProviderError>> + Send + 'a>>;

/// A language-model completion endpoint.
///
/// Implementations send `messages` to `model` and resolve to the returned text.
/// Exactly one request per call; no retries.
pub trait CompletionService: Send + Sync {
    fn complete<'a>(&'a self, model: &'a ModelName, messages: &'a [ChatMessage])
    -> CompletionFut<'a>;
}

fn base_client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert("X-Stainless-Lang", HeaderValue::from_static("rust"));
    default_headers.insert(
        "X-Stainless-OS",
        HeaderValue::from_static(std::env::consts::OS),
    );
    default_headers.insert(
        "X-Stainless-Arch",
        HeaderValue::from_static(std::env::consts::ARCH),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// Builds the HTTP client used for completion requests.
///
/// No total request timeout is set: a hung completion blocks the run.
/// `https_only` is relaxed only for plain-`http` base URLs (local proxies, mock servers).
pub fn http_client(https_only: bool) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder().https_only(https_only).build()
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
