//! OpenAI Chat Completions client.
//!
//! Request format: `{ model, messages: [{ role, content }] }` (non-streaming).
//! Response format: `{ choices: [{ message: { content } }], usage: { prompt_tokens, completion_tokens } }`

use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    CompletionFut, CompletionService, OPENAI_API_BASE_URL, ProviderError, http_client,
    read_capped_error_body,
};
use reducer_types::{ApiKey, ApiUsage, ChatMessage, Completion, ModelName};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct OpenAIChatClient {
    client: reqwest::Client,
    api_key: ApiKey,
    endpoint: String,
}

impl OpenAIChatClient {
    pub fn new(api_key: ApiKey) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, OPENAI_API_BASE_URL)
    }

    /// Client against an OpenAI-compatible server rooted at `base_url`.
    pub fn with_base_url(api_key: ApiKey, base_url: &str) -> Result<Self, ProviderError> {
        let base = base_url.trim().trim_end_matches('/');
        let https_only = !base.starts_with("http://");
        Ok(Self {
            client: http_client(https_only)?,
            api_key,
            endpoint: format!("{base}{CHAT_COMPLETIONS_PATH}"),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        model: &ModelName,
        messages: &[ChatMessage],
    ) -> Result<Completion, ProviderError> {
        let body = build_request_body(model, messages);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ProviderError::Api { status, body });
        }

        let text = response.text().await?;
        let completion = parse_completion(&text)?;
        if let Some(usage) = completion.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Provider reported usage"
            );
        }
        Ok(completion)
    }
}

impl CompletionService for OpenAIChatClient {
    fn complete<'a>(
        &'a self,
        model: &'a ModelName,
        messages: &'a [ChatMessage],
    ) -> CompletionFut<'a> {
        Box::pin(self.send(model, messages))
    }
}

fn build_request_body(model: &ModelName, messages: &[ChatMessage]) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|msg| {
            json!({
                "role": msg.role.as_str(),
                "content": msg.content(),
            })
        })
        .collect();

    json!({
        "model": model.as_str(),
        "messages": messages,
    })
}

fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let usage = parsed.usage.map(|u| ApiUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    let message = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".to_string()))?;

    match message.content {
        Some(text) => Ok(Completion { text, usage }),
        None => Err(ProviderError::MalformedResponse(match message.refusal {
            Some(refusal) => format!("model refused: {refusal}"),
            None => "choice has no message content".to_string(),
        })),
    }
}
