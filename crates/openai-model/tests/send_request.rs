use std::time::Duration;

use relay_agent_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ToolSpec,
};
use relay_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAIProvider {
    let config = OpenAIConfigBuilder::with_api_key("test-key")
        .with_model("test-model")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_timeout(Duration::from_secs(5))
        .build();
    OpenAIProvider::new(config)
}

fn request() -> ModelRequest {
    ModelRequest {
        messages: vec![
            ModelMessage::System("Use tools.".to_owned()),
            ModelMessage::User("What's the weather?".to_owned()),
        ],
        tools: vec![ToolSpec {
            name: "search".to_owned(),
            description: "Searches the web.".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
    }
}

#[tokio::test]
async fn test_final_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "function_call": "auto",
            "functions": [{ "name": "search" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Sunny." },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = provider(&server).send_request(&request()).await.unwrap();
    assert_eq!(resp, ModelResponse::final_text("Sunny."));
}

#[tokio::test]
async fn test_function_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "search",
                        "arguments": "{\"query\":\"weather\"}"
                    }
                },
                "finish_reason": "function_call"
            }]
        })))
        .mount(&server)
        .await;

    let resp = provider(&server).send_request(&request()).await.unwrap();
    assert_eq!(
        resp,
        ModelResponse::tool_call("search", "{\"query\":\"weather\"}")
    );
}

#[tokio::test]
async fn test_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let err = provider.send_request(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert!(err.message().contains("slow down"));

    let err = provider.send_request(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.message().contains("500"));
}

#[tokio::test]
async fn test_invalid_responses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })),
        )
        .mount(&server)
        .await;

    let provider = provider(&server);
    let err = provider.send_request(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);

    let err = provider.send_request(&request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
}

#[tokio::test]
async fn test_unreachable() {
    let config = OpenAIConfigBuilder::with_api_key("test-key")
        .with_base_url("http://127.0.0.1:1/v1")
        .build();
    let err = OpenAIProvider::new(config)
        .send_request(&request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}
