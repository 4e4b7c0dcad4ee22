//! Wire-level tests for the OpenAI-compatible adapter against a mock server.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prospecto::error::EngineError;
use prospecto::provider::{OpenAiCompatAdapter, ProviderAdapter};
use prospecto::types::{CallParams, ChatMessage};

fn adapter(server: &MockServer) -> OpenAiCompatAdapter {
    OpenAiCompatAdapter::new("primary", "gpt-4o-mini", "test-key", server.uri())
}

#[tokio::test]
async fn parses_text_and_usage_from_a_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hola"},
                {"role": "assistant", "content": "buenas"},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "¿En qué sector buscas?"}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 9, "total_tokens": 51},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let messages = vec![
        ChatMessage::system("sys"),
        ChatMessage::user("hola"),
        ChatMessage::agent("buenas"),
    ];
    let reply = adapter(&server)
        .generate(&messages, &CallParams::reply())
        .await
        .unwrap();

    assert_eq!(reply.text, "¿En qué sector buscas?");
    assert_eq!(reply.usage.input_tokens, 42);
    assert_eq!(reply.usage.output_tokens, 9);
    assert_eq!(reply.usage.total_tokens, 51);
}

#[tokio::test]
async fn extraction_calls_request_a_json_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_object"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{}"}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = adapter(&server)
        .generate(&[ChatMessage::user("hola")], &CallParams::extraction())
        .await
        .unwrap();
    assert_eq!(reply.text, "{}");
}

#[tokio::test]
async fn unauthorized_maps_to_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate(&[ChatMessage::user("hola")], &CallParams::reply())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Authentication(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn rate_limit_carries_the_retry_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"retry_after": 2}})),
        )
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate(&[ChatMessage::user("hola")], &CallParams::reply())
        .await
        .unwrap_err();

    match err {
        EngineError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, Some(2000)),
        other => panic!("expected rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate(&[ChatMessage::user("hola")], &CallParams::reply())
        .await
        .unwrap_err();

    assert!(err.is_transient(), "expected transient error, got {err:?}");
}

#[tokio::test]
async fn empty_choices_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .generate(&[ChatMessage::user("hola")], &CallParams::reply())
        .await
        .unwrap_err();

    match err {
        EngineError::Provider { message, .. } => assert!(message.contains("no choices")),
        other => panic!("expected provider error, got {other:?}"),
    }
}
