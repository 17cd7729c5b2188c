//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use reducer_providers::OpenAIChatClient;
use reducer_types::ApiKey;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TEST_API_KEY: &str = "sk-test-key";
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Start a mock server that simulates the OpenAI API
pub async fn start_openai_mock() -> MockServer {
    MockServer::start().await
}

/// Client pointed at the mock server
pub fn client_for(server: &MockServer) -> OpenAIChatClient {
    let key = ApiKey::new(TEST_API_KEY).expect("test key is not blank");
    OpenAIChatClient::with_base_url(key, &server.uri()).expect("client builds")
}

/// A Chat Completions response body with one choice
pub fn chat_completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_234_567_890,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 20,
            "total_tokens": 30
        }
    })
}

/// Mount a fixed Chat Completions response
pub async fn mount_chat_completion(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body(content)))
        .mount(server)
        .await;
}

/// Answers every request with the content of its first message
pub struct EchoUserMessage;

impl Respond for EchoUserMessage {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap_or(Value::Null);
        let content = body["messages"][0]["content"].as_str().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(chat_completion_body(content))
    }
}

/// Mount the echo responder
pub async fn mount_echo(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(EchoUserMessage)
        .mount(server)
        .await;
}

/// Repeats a one-token word `n` times
pub fn words(n: usize) -> String {
    "hello ".repeat(n)
}
