//! End-to-end reduction through the OpenAI client and a mock server

use reducer_context::{
    ContextReducer, LimitProfile, ModelRegistry, ReduceError, ReducerSettings, SEPARATOR,
    TokenCounter,
};
use reducer_providers::{OpenAIChatClient, ProviderError};
use reducer_types::ModelName;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    CHAT_COMPLETIONS_PATH, client_for, mount_chat_completion, mount_echo, start_openai_mock,
    words,
};

fn reducer_with(limits: LimitProfile, client: OpenAIChatClient) -> ContextReducer<OpenAIChatClient> {
    let model = ModelName::default_model();
    let counter = TokenCounter::for_model(model.as_str()).unwrap();
    ContextReducer::new(ReducerSettings { model, limits }, counter, client)
}

fn default_limits() -> LimitProfile {
    ModelRegistry::new().get("gpt-4o-mini").unwrap().limits()
}

async fn received_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn short_context_needs_one_request() {
    let server = start_openai_mock().await;
    mount_chat_completion(&server, "Summary of everything.").await;
    let reducer = reducer_with(default_limits(), client_for(&server));

    let reduction = reducer
        .reduce(&words(10_000), "Summarize the notes.")
        .await
        .unwrap();

    assert_eq!(reduction.responses, vec!["Summary of everything.".to_string()]);
    assert_eq!(received_count(&server).await, 1);
    assert!(reduction.stats.waits.is_empty());
}

#[tokio::test]
async fn slices_are_sent_in_order_and_cover_the_context() {
    let server = start_openai_mock().await;
    mount_echo(&server).await;
    let limits = LimitProfile::new(2_000, 1_000, 1_000_000);
    let reducer = reducer_with(limits, client_for(&server));
    let prompt = "Extract every name.";
    let context = words(1_000);

    let reduction = reducer.reduce(&context, prompt).await.unwrap();

    assert!(reduction.responses.len() > 1);
    assert_eq!(received_count(&server).await, reduction.responses.len());

    let prefix = format!("{prompt}{SEPARATOR}");
    let slices: Vec<&str> = reduction
        .responses
        .iter()
        .map(|r| r.strip_prefix(&prefix).expect("echoed request"))
        .collect();
    assert_eq!(slices.concat(), context);
}

#[tokio::test]
async fn failing_request_aborts_the_run() {
    let server = start_openai_mock().await;
    Mock::given(method("POST"))
        .and(path(CHAT_COMPLETIONS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    let limits = LimitProfile::new(2_000, 1_000, 1_000_000);
    let reducer = reducer_with(limits, client_for(&server));

    let err = reducer.reduce(&words(1_000), "p").await.unwrap_err();

    match err {
        ReduceError::Completion {
            iteration,
            source: ProviderError::Api { status, .. },
        } => {
            assert_eq!(iteration, 1);
            assert_eq!(status.as_u16(), 500);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(received_count(&server).await, 1);
}

#[tokio::test]
async fn prompt_too_large_sends_nothing() {
    let server = start_openai_mock().await;
    mount_chat_completion(&server, "unused").await;
    let limits = LimitProfile::new(1_000, 500, 10_000);
    let reducer = reducer_with(limits, client_for(&server));

    let err = reducer.reduce("context", &words(600)).await.unwrap_err();

    assert!(matches!(err, ReduceError::Budget(_)));
    assert_eq!(received_count(&server).await, 0);
}

#[tokio::test]
async fn responses_round_trip_through_output_file() {
    let server = start_openai_mock().await;
    mount_echo(&server).await;
    let limits = LimitProfile::new(2_000, 1_000, 1_000_000);
    let reducer = reducer_with(limits, client_for(&server));

    let reduction = reducer.reduce(&words(600), "p").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("notes_reduced.json");
    let json = serde_json::to_string_pretty(&reduction.responses).unwrap();
    reducer_utils::atomic_write(&out, json.as_bytes()).unwrap();

    let written: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, reduction.responses);
    assert!(std::fs::read_to_string(&out).unwrap().contains("\n  \""));
}
