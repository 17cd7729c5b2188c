//! OpenAI Chat Completions client against a mock server

use reducer_providers::{CompletionService, OpenAIChatClient, ProviderError};
use reducer_types::{ApiKey, ChatMessage, ModelName};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    CHAT_COMPLETIONS_PATH, TEST_API_KEY, chat_completion_body, client_for, mount_chat_completion,
    start_openai_mock,
};

#[tokio::test]
async fn returns_first_choice_text() {
    let server = start_openai_mock().await;
    mount_chat_completion(&server, "Three meetings were scheduled.").await;
    let client = client_for(&server);

    let completion = client
        .complete(
            &ModelName::default_model(),
            &[ChatMessage::user("List the meetings.")],
        )
        .await
        .unwrap();

    assert_eq!(completion.text, "Three meetings were scheduled.");
    let usage = completion.usage.unwrap();
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.output_tokens, 20);
}

#[tokio::test]
async fn sends_bearer_auth_model_and_user_message() {
    let server = start_openai_mock().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .and(header("authorization", format!("Bearer {TEST_API_KEY}").as_str()))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "prompt\n\nslice" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let completion = client
        .complete(
            &ModelName::default_model(),
            &[ChatMessage::user("prompt\n\nslice")],
        )
        .await
        .unwrap();

    assert_eq!(completion.text, "ok");
}

#[tokio::test]
async fn rate_limit_status_is_an_api_error() {
    let server = start_openai_mock().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit reached for gpt-4o-mini"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client
        .complete(&ModelName::default_model(), &[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    match err {
        ProviderError::Api { status, body } => {
            assert_eq!(status.as_u16(), 429);
            assert!(body.contains("Rate limit reached"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn large_error_body_is_truncated() {
    let server = start_openai_mock().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(100_000)))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client
        .complete(&ModelName::default_model(), &[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    let ProviderError::Api { body, .. } = err else {
        panic!("expected Api error");
    };
    assert!(body.ends_with("...(truncated)"));
    assert!(body.len() < 40_000);
}

#[tokio::test]
async fn response_without_choices_is_malformed() {
    let server = start_openai_mock().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client
        .complete(&ModelName::default_model(), &[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let key = ApiKey::new(TEST_API_KEY).unwrap();
    // Port 9 (discard) is not listening on test machines.
    let client = OpenAIChatClient::with_base_url(key, "http://127.0.0.1:9").unwrap();

    let err = client
        .complete(&ModelName::default_model(), &[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
}
