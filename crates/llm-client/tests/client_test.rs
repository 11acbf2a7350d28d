//! Integration tests for the provider client.

use llm_client::{LlmClient, LlmError, Message};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> LlmClient {
    LlmClient::new(
        "test-api-key",
        mock_server.uri(),
        "test-model",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn completion_body(content: &str, prompt_tokens: u32, completion_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": content
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}

#[tokio::test]
async fn test_complete_returns_content_and_usage() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there", 10, 15)))
        .mount(&mock_server)
        .await;

    let completion = client
        .complete(vec![Message::user("Hello")])
        .await
        .unwrap();

    assert_eq!(completion.content, "Hi there");
    let usage = completion.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 15);
    assert_eq!(usage.total_tokens, 25);
}

#[tokio::test]
async fn test_complete_without_usage_field() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    let body = serde_json::json!({
        "id": "chatcmpl-456",
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "No usage reported" },
            "finish_reason": "stop"
        }]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let completion = client
        .complete(vec![Message::user("Hello")])
        .await
        .unwrap();

    assert_eq!(completion.content, "No usage reported");
    assert!(completion.usage.is_none());
}

#[tokio::test]
async fn test_empty_content_is_an_error() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("", 1, 0)))
        .mount(&mock_server)
        .await;

    let result = client.complete(vec![Message::user("Hello")]).await;
    assert!(matches!(result, Err(LlmError::EmptyResponse)));
}

#[tokio::test]
async fn test_rate_limit_is_mapped() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let result = client.complete(vec![Message::user("Hello")]).await;
    assert!(matches!(result, Err(LlmError::RateLimit)));
}

#[tokio::test]
async fn test_unauthorized_is_mapped_and_not_retried() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client
        .complete_with_retry(vec![Message::user("Hello")], Some(3))
        .await;
    assert!(matches!(result, Err(LlmError::Unauthorized)));
}

#[tokio::test]
async fn test_retry_recovers_from_transient_error() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    // First attempt fails with a server error
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    // Retry succeeds
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Recovered", 5, 5)))
        .mount(&mock_server)
        .await;

    let completion = client
        .complete_with_retry(vec![Message::user("Hello")], Some(2))
        .await
        .unwrap();
    assert_eq!(completion.content, "Recovered");
}

#[tokio::test]
async fn test_blank_api_key_fails_before_any_call() {
    let mock_server = MockServer::start().await;
    let client = LlmClient::new(
        "  ",
        mock_server.uri(),
        "test-model",
        Duration::from_secs(5),
    )
    .unwrap();

    assert!(matches!(
        client.validate_api_key(),
        Err(LlmError::Misconfigured(_))
    ));

    // No request must reach the server
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("nope", 1, 1)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = client.complete(vec![Message::user("Hello")]).await;
    assert!(matches!(result, Err(LlmError::Misconfigured(_))));
}

#[tokio::test]
async fn test_multibyte_body_survives_debug_logging() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    // Hand-built body padded so byte 200 lands inside a two-byte 'é':
    // logging must truncate on a char boundary, not a byte offset.
    let prefix = r#"{"id":"c","object":"chat.completion","created":1,"model":"m","choices":[{"index":0,"message":{"role":"assistant","content":""#;
    let padding = "a".repeat(199 - prefix.len());
    let body = format!(
        "{}{}é and more text to keep the body well past the preview\"}},\"finish_reason\":\"stop\"}}],\"usage\":{{\"prompt_tokens\":3,\"completion_tokens\":7,\"total_tokens\":10}}}}",
        prefix, padding
    );
    assert!(body.len() > 200);
    assert!(!body.is_char_boundary(200));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&mock_server)
        .await;

    // Enable debug logging so the body preview is actually rendered
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let completion = client
        .complete(vec![Message::user("Hello")])
        .await
        .unwrap();
    assert!(completion.content.contains('é'));
    assert_eq!(completion.usage.unwrap().total_tokens, 10);
}

#[tokio::test]
async fn test_health_check() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": []
        })))
        .mount(&mock_server)
        .await;

    assert!(client.health_check().await);
}
