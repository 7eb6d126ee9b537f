//! HTTP-level tests for the inference client against a mock server

mod common;

use common::EchoTool;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zarvis::agent::Orchestrator;
use zarvis::backend::{
    InferenceClient, ReasoningBackend, ReasoningResponse, RetryPolicy, SpeechBackend,
    TranscriptionBackend, VisionBackend,
};
use zarvis::config::{AgentConfig, AppConfig};
use zarvis::messages::{ConversationState, Message};
use zarvis::tools::{ArgSpec, ArgType, ToolDescriptor, ToolRegistry};
use zarvis::ZarvisError;

fn client(server: &MockServer) -> InferenceClient {
    let config = AppConfig::default()
        .with_api_key("test-key")
        .with_base_url(server.uri());
    InferenceClient::new(&config).unwrap()
}

fn listen_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("listen_tool", "Transcribe audio").arg(ArgSpec::required(
        "audio_file_path",
        ArgType::String,
        "Path to the audio file",
    ))
}

#[tokio::test]
async fn test_chat_tool_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "tool_choice": "auto",
            "stream": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": {
                        "name": "listen_tool",
                        "arguments": "{\"audio_file_path\": \"recording.wav\"}"
                    }
                }]
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .complete(
            &[Message::user("Transcribe recording.wav")],
            &[listen_descriptor()],
        )
        .await
        .unwrap();

    match response {
        ReasoningResponse::ToolCalls { invocations, .. } => {
            assert_eq!(invocations.len(), 1);
            assert_eq!(invocations[0].id, "call_9");
            assert_eq!(invocations[0].name, "listen_tool");
            assert_eq!(invocations[0].arg("audio_file_path"), Some("recording.wav"));
        }
        other => panic!("expected tool calls, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_final_answer_without_tools() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "4"}}]
        })))
        .mount(&server)
        .await;

    let response = client(&server)
        .complete(&[Message::user("What is 2+2?")], &[])
        .await
        .unwrap();

    assert_eq!(response, ReasoningResponse::Final("4".to_string()));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
}

#[tokio::test]
async fn test_transcription_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/translations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello world"})))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .transcribe("recording.wav", b"RIFF....WAVE".to_vec(), "Transcribe clearly")
        .await
        .unwrap();
    assert_eq!(text, "hello world");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("whisper-large-v3"));
    assert!(body.contains("filename=\"recording.wav\""));
}

#[tokio::test]
async fn test_vision_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_completion_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "A cat on a sofa."}}]
        })))
        .mount(&server)
        .await;

    let description = client(&server)
        .describe("https://example.com/cat.png", "What is this?")
        .await
        .unwrap();
    assert_eq!(description, "A cat on a sofa.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["messages"][0]["content"][1]["image_url"]["url"],
        "https://example.com/cat.png"
    );
}

#[tokio::test]
async fn test_vision_without_choices_is_upstream_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let result = client(&server)
        .describe("https://example.com/cat.png", "What is this?")
        .await;
    assert!(matches!(result, Err(ZarvisError::Upstream(_))));
}

#[tokio::test]
async fn test_malformed_tool_arguments_fail_only_that_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {"id": "good", "type": "function",
                     "function": {"name": "echo", "arguments": "{\"text\":\"ok\"}"}},
                    {"id": "bad", "type": "function",
                     "function": {"name": "echo", "arguments": "{\"text\": "}}
                ]
            }}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "One echo worked."}}]
        })))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(
        Arc::new(client(&server)),
        ToolRegistry::new().with(EchoTool::new("echo")),
        &AgentConfig::default(),
    );

    let result = orchestrator
        .think(ConversationState::new(), "echo twice")
        .await
        .unwrap();

    assert_eq!(result.response, "One echo worked.");
    let messages = result.state.messages();
    assert_eq!(messages.len(), 5);
    match (&messages[2], &messages[3]) {
        (
            Message::ToolResult {
                invocation_id: good,
                content: good_content,
                is_error: false,
                ..
            },
            Message::ToolResult {
                invocation_id: bad,
                content: bad_content,
                is_error: true,
                ..
            },
        ) => {
            assert_eq!(good, "good");
            assert_eq!(good_content, "ok");
            assert_eq!(bad, "bad");
            assert!(bad_content.starts_with("Error: Invalid argument: Malformed arguments"));
        }
        other => panic!("unexpected tool results: {:?}", other),
    }
    result.state.validate().unwrap();
}

#[tokio::test]
async fn test_speech_returns_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_partial_json(json!({
            "model": "playai-tts",
            "voice": "Aaliyah-PlayAI",
            "input": "Hello",
            "response_format": "wav",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFFfake".to_vec()))
        .mount(&server)
        .await;

    let audio = client(&server)
        .synthesize("Hello", "Aaliyah-PlayAI")
        .await
        .unwrap();
    assert_eq!(audio, b"RIFFfake".to_vec());
}

#[tokio::test]
async fn test_retry_on_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "recovered"}}]
        })))
        .mount(&server)
        .await;

    let client = client(&server).with_retry(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
    });
    let response = client.complete(&[Message::user("hi")], &[]).await.unwrap();

    assert_eq!(response, ReasoningResponse::Final("recovered".to_string()));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).complete(&[Message::user("hi")], &[]).await;
    assert!(matches!(result, Err(ZarvisError::Upstream(_))));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).with_retry(RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
    });
    match client.complete(&[Message::user("hi")], &[]).await {
        Err(ZarvisError::Upstream(message)) => assert!(message.contains("400")),
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[test]
fn test_missing_api_key() {
    let result = InferenceClient::new(&AppConfig::default());
    assert!(matches!(result, Err(ZarvisError::Config(_))));
}
