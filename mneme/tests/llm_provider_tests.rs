mod common;

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mneme::config::LlmConfig;
use mneme::error::MnemeError;
use mneme::intelligence::ImportanceScorer;
use mneme::llm::{ChatBackend, LlmProvider};
use mneme::models::ChatMessage;

fn llm_config(base_url: &str, max_retries: u32) -> LlmConfig {
    LlmConfig {
        model: "openrouter/openrouter/auto".to_string(),
        fallback_model: None,
        scorer_model: "openrouter/openrouter/auto".to_string(),
        scorer_fallback_model: None,
        api_key: Some("sk-test".to_string()),
        base_url: Some(base_url.to_string()),
        timeout_secs: 5,
        max_retries,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 0,
        "model": "openrouter/auto",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

fn api_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": { "message": message, "type": null, "param": null, "code": null }
    }))
}

#[tokio::test]
async fn test_complete_returns_message_content() {
    common::init_test_logger();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi Priya")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LlmProvider::new(Some(&llm_config(&server.uri(), 0)));
    let reply = provider
        .complete(&[ChatMessage::user("hello")], None)
        .await
        .unwrap();

    assert_eq!(reply, "Hi Priya");
}

#[tokio::test]
async fn test_untyped_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(api_error(500, "upstream exploded"))
        .expect(2)
        .mount(&server)
        .await;

    let provider = LlmProvider::new(Some(&llm_config(&server.uri(), 1)));
    let err = provider
        .complete(&[ChatMessage::user("hello")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, MnemeError::Llm(_)));
}

#[tokio::test]
async fn test_rate_limit_is_reported_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(api_error(429, "Rate limit reached for requests"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LlmProvider::new(Some(&llm_config(&server.uri(), 2)));
    let err = provider
        .complete(&[ChatMessage::user("hello")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, MnemeError::LlmRateLimit { .. }));
    assert!(err.is_backend_failure());
}

#[tokio::test]
async fn test_stream_yields_tokens() {
    let server = MockServer::start().await;
    let chunk = |content: &str| {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 0,
            "model": "openrouter/auto",
            "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
        })
    };
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        chunk("Your name"),
        chunk(" is"),
        chunk(" Priya.")
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("\"stream\":true"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let provider = LlmProvider::new(Some(&llm_config(&server.uri(), 0)));
    let tokens: Vec<String> = provider
        .stream(&[ChatMessage::user("What's my name?")])
        .await
        .unwrap()
        .map(|token| token.unwrap())
        .collect()
        .await;

    assert_eq!(tokens, vec!["Your name", " is", " Priya."]);
}

#[tokio::test]
async fn test_scorer_falls_back_to_second_provider() {
    let primary_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(api_error(503, "model overloaded"))
        .expect(1)
        .mount(&primary_server)
        .await;

    let fallback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"importance": 0.9, "memory": "User is allergic to peanuts"}"#,
        )))
        .expect(1)
        .mount(&fallback_server)
        .await;

    let primary: Arc<dyn ChatBackend> =
        Arc::new(LlmProvider::new(Some(&llm_config(&primary_server.uri(), 0))));
    let fallback: Arc<dyn ChatBackend> =
        Arc::new(LlmProvider::new(Some(&llm_config(&fallback_server.uri(), 0))));
    let scorer = ImportanceScorer::new(primary, Some(fallback));

    let score = scorer
        .score("Careful, peanuts put me in hospital")
        .await
        .unwrap();

    assert_eq!(score.importance, 0.9);
    assert_eq!(score.accepted(0.8), Some("User is allergic to peanuts"));
}

#[tokio::test]
async fn test_unconfigured_provider_fails_on_use() {
    let provider = LlmProvider::new(None);
    assert!(!provider.is_available());

    let err = provider.stream(&[ChatMessage::user("hi")]).await.err().unwrap();
    assert!(matches!(err, MnemeError::LlmUnavailable(_)));
}
