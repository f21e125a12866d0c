//! End-to-end chat completion scenarios against a wiremock-backed model
//! backend: plain passthrough, tool-call round trip, and the failure modes
//! a reverse-proxying gateway has to surface correctly.

mod common;

use common::{
    auth_header_value, model_config, spawn_test_server, spawn_test_server_with_webui_auth_enabled,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn basic_chat_completion_without_tools_is_passed_through() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "local-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .mount(&backend)
        .await;

    let (base_url, _state) =
        spawn_test_server(vec![model_config("local-model", &backend.uri(), 10.0)]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .header("Authorization", auth_header_value())
        .json(&json!({
            "model": "local-model",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "hello there");
}

#[tokio::test]
async fn tool_invocation_is_translated_into_an_openai_tool_call() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 1,
            "model": "local-model",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "```json\n{\"tool_calls\":[{\"type\":\"function\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"{\\\"city\\\":\\\"nyc\\\"}\"}}]}\n```"
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 9, "total_tokens": 14}
        })))
        .mount(&backend)
        .await;

    let (base_url, _state) =
        spawn_test_server(vec![model_config("local-model", &backend.uri(), 10.0)]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .header("Authorization", auth_header_value())
        .json(&json!({
            "model": "local-model",
            "messages": [{"role": "user", "content": "what's the weather in nyc?"}],
            "tools": [{
                "type": "function",
                "function": {"name": "get_weather", "parameters": {"type": "object"}}
            }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    let tool_calls = &body["choices"][0]["message"]["tool_calls"];
    assert!(tool_calls.is_array());
    assert_eq!(
        tool_calls[0]["function"]["name"],
        "get_weather",
        "body: {body}"
    );
    assert_eq!(body["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn unknown_model_returns_400_model_not_found() {
    let (base_url, _state) = spawn_test_server(vec![]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .header("Authorization", auth_header_value())
        .json(&json!({
            "model": "does-not-exist",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "model_not_found");
}

#[tokio::test]
async fn backend_server_error_surfaces_as_503_backend_unavailable() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    let (base_url, _state) =
        spawn_test_server(vec![model_config("local-model", &backend.uri(), 10.0)]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .header("Authorization", auth_header_value())
        .json(&json!({
            "model": "local-model",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn missing_auth_on_a_non_optional_endpoint_is_rejected() {
    let (base_url, _state) = spawn_test_server(vec![]).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/v1/models/status", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_auth_on_chat_completions_is_rejected_by_default() {
    let (base_url, _state) =
        spawn_test_server(vec![model_config("local-model", "http://127.0.0.1:1", 10.0)]).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .json(&json!({
            "model": "local-model",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_auth_on_chat_completions_is_tolerated_in_browser_optional_mode() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-3",
            "object": "chat.completion",
            "created": 1,
            "model": "local-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "ok"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })))
        .mount(&backend)
        .await;

    let (base_url, _state) = spawn_test_server_with_webui_auth_enabled(
        vec![model_config("local-model", &backend.uri(), 10.0)],
        true,
    )
    .await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .json(&json!({
            "model": "local-model",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
}
